use crate::model::DiscreteModel;
use crate::prelude::*;
use faer::Mat;

/// Drives a [`DiscreteModel`] over input signals.
///
/// All scratch is sized at construction; the per-sample loop performs no
/// allocation. The runner borrows the model exclusively for the duration of
/// a simulation run.
pub struct ModelRunner<'a> {
    model: &'a mut DiscreteModel,
    show_progress: bool,
    ucur: Vec<f64>,
    ycur: Vec<f64>,
    xnew: Vec<f64>,
    z: Vec<f64>,
    ps: Vec<Vec<f64>>,
}

impl<'a> ModelRunner<'a> {
    pub fn new(model: &'a mut DiscreteModel, show_progress: bool) -> Self {
        let (nu, ny, nx, nn) = (model.nu, model.ny, model.nx, model.nn);
        let ps = model.subs.iter().map(|s| vec![0.0; s.np()]).collect();
        ModelRunner {
            model,
            show_progress,
            ucur: vec![0.0; nu],
            ycur: vec![0.0; ny],
            xnew: vec![0.0; nx],
            z: vec![0.0; nn],
            ps,
        }
    }

    /// Simulate over `u` (`nu` rows, one column per sample) and return the
    /// output (`ny` rows, same column count).
    pub fn run(&mut self, u: &Mat<f64>) -> Result<Mat<f64>> {
        let mut y = Mat::zeros(self.model.ny, u.ncols());
        self.run_into(&mut y, u)?;
        Ok(y)
    }

    /// Simulate into a caller-provided output matrix.
    pub fn run_into(&mut self, y: &mut Mat<f64>, u: &Mat<f64>) -> Result<()> {
        let n = u.ncols();
        if u.nrows() != self.model.nu {
            return Err(Error::InputRows {
                expected: self.model.nu,
                found: u.nrows(),
            });
        }
        if y.nrows() != self.model.ny || y.ncols() != n {
            return Err(Error::OutputShape {
                expected_rows: self.model.ny,
                expected_cols: n,
                rows: y.nrows(),
                cols: y.ncols(),
            });
        }

        let ModelRunner {
            model,
            show_progress,
            ucur,
            ycur,
            xnew,
            z,
            ps,
        } = self;
        let DiscreteModel {
            subs,
            a,
            b,
            c,
            x0,
            dy,
            ey,
            fy,
            y0,
            x,
            ..
        } = &mut **model;

        let progress_stride = if *show_progress && n >= 10 { n / 10 } else { 0 };
        for s in 0..n {
            for (i, ui) in ucur.iter_mut().enumerate() {
                *ui = u[(i, s)];
            }
            z.fill(0.0);

            // forward substitution over the sub-problems: block k may read
            // the already-filled solutions of blocks before it
            for (sub, p) in subs.iter_mut().zip(ps.iter_mut()) {
                gemv(p, &sub.dq, x);
                gemv_acc(p, &sub.eq, ucur);
                gemv_acc(p, &sub.fqprev, z);
                let zk = sub.solver.solve(p);
                z[sub.z_off..sub.z_off + sub.nn].copy_from_slice(zk);
                if !sub.solver.has_converged() {
                    if z[sub.z_off..sub.z_off + sub.nn]
                        .iter()
                        .all(|v| v.is_finite())
                    {
                        log::warn!(
                            "nonlinear solver did not converge at sample {s}; continuing with its best value"
                        );
                    } else {
                        return Err(Error::NonFinite { sample: s });
                    }
                }
            }

            ycur.copy_from_slice(y0);
            gemv_acc(ycur, dy, x);
            gemv_acc(ycur, ey, ucur);
            gemv_acc(ycur, fy, z);
            for (i, &yi) in ycur.iter().enumerate() {
                y[(i, s)] = yi;
            }

            xnew.copy_from_slice(x0);
            gemv_acc(xnew, a, x);
            gemv_acc(xnew, b, ucur);
            gemv_acc(xnew, c, z);
            x.copy_from_slice(xnew);

            if progress_stride > 0 && s % progress_stride == 0 && s > 0 {
                log::info!("simulated {s}/{n} samples");
            }
        }
        Ok(())
    }
}
