use crate::prelude::*;

/// Residual callback of a nonlinear port: `(q, res, jq)` with `q` the
/// element's local q-vector, `res` its `nn` residual values and `jq` the
/// row-major `nn × nq` Jacobian `∂res/∂q`.
pub type ResidualFn = Arc<dyn Fn(&[f64], &mut [f64], &mut [f64]) + Send + Sync>;

#[derive(Clone)]
pub struct Nonlinearity {
    pub nn: usize,
    pub func: ResidualFn,
}

/// A circuit primitive, frozen at construction.
///
/// The constitutive law over its `nb` branches, `nx` states, `nq` nonlinear
/// port quantities and `nu` inputs is
///
/// ```text
/// Mv·v + Mi·i + Mx·x̄ + Mẋ·ẋ̄ + Mq·q = Mu·u + u0
/// ```
///
/// with `nl` rows, and the output law `y = Pv·v + Pi·i + Px·x̄ + Pẋ·ẋ̄ + Pq·q`
/// with `ny` rows. A nonlinear element additionally carries a residual over
/// its local `q` with `nn = nb + nx + nq − nl` unknowns.
#[derive(Clone)]
pub struct Element {
    pub mv: SpRat,
    pub mi: SpRat,
    pub mx: SpRat,
    pub mxd: SpRat,
    pub mq: SpRat,
    pub mu: SpRat,
    pub u0: SpRat,
    pub pv: SpRat,
    pub pi: SpRat,
    pub px: SpRat,
    pub pxd: SpRat,
    pub pq: SpRat,
    /// `(pin name, branch, polarity)`; a pin may terminate several branches.
    pub pins: Vec<(String, usize, i64)>,
    pub nonlinearity: Option<Nonlinearity>,
}

impl Element {
    pub fn nl(&self) -> usize {
        self.mv.nrows()
    }

    pub fn nb(&self) -> usize {
        self.mv.ncols()
    }

    pub fn nx(&self) -> usize {
        self.mx.ncols()
    }

    pub fn nq(&self) -> usize {
        self.mq.ncols()
    }

    pub fn nu(&self) -> usize {
        self.mu.ncols()
    }

    pub fn ny(&self) -> usize {
        self.pv.nrows()
    }

    /// Number of nonlinear unknowns contributed by this element.
    pub fn nn(&self) -> usize {
        self.nb() + self.nx() + self.nq() - self.nl()
    }

    pub fn pin_entries(&self, name: &str) -> Vec<(usize, i64)> {
        self.pins
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|&(_, b, pol)| (b, pol))
            .collect()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("nl", &self.nl())
            .field("nb", &self.nb())
            .field("nx", &self.nx())
            .field("nq", &self.nq())
            .field("nu", &self.nu())
            .field("ny", &self.ny())
            .field("nonlinear", &self.nonlinearity.is_some())
            .finish()
    }
}

/// Builder that infers and validates all element dimensions.
#[derive(Default)]
pub struct ElementBuilder {
    mv: Option<RatMat>,
    mi: Option<RatMat>,
    mx: Option<RatMat>,
    mxd: Option<RatMat>,
    mq: Option<RatMat>,
    mu: Option<RatMat>,
    u0: Option<RatMat>,
    pv: Option<RatMat>,
    pi: Option<RatMat>,
    px: Option<RatMat>,
    pxd: Option<RatMat>,
    pq: Option<RatMat>,
    pins: Vec<(String, usize, i64)>,
    nonlinearity: Option<Nonlinearity>,
}

impl ElementBuilder {
    pub fn new() -> Self {
        ElementBuilder::default()
    }

    pub fn mv(mut self, m: RatMat) -> Self {
        self.mv = Some(m);
        self
    }

    pub fn mi(mut self, m: RatMat) -> Self {
        self.mi = Some(m);
        self
    }

    pub fn mx(mut self, m: RatMat) -> Self {
        self.mx = Some(m);
        self
    }

    pub fn mxd(mut self, m: RatMat) -> Self {
        self.mxd = Some(m);
        self
    }

    pub fn mq(mut self, m: RatMat) -> Self {
        self.mq = Some(m);
        self
    }

    pub fn mu(mut self, m: RatMat) -> Self {
        self.mu = Some(m);
        self
    }

    pub fn u0(mut self, m: RatMat) -> Self {
        self.u0 = Some(m);
        self
    }

    pub fn pv(mut self, m: RatMat) -> Self {
        self.pv = Some(m);
        self
    }

    pub fn pi(mut self, m: RatMat) -> Self {
        self.pi = Some(m);
        self
    }

    pub fn px(mut self, m: RatMat) -> Self {
        self.px = Some(m);
        self
    }

    pub fn pxd(mut self, m: RatMat) -> Self {
        self.pxd = Some(m);
        self
    }

    pub fn pq(mut self, m: RatMat) -> Self {
        self.pq = Some(m);
        self
    }

    pub fn pin(mut self, name: &str, branch: usize, polarity: i64) -> Self {
        self.pins.push((name.to_string(), branch, polarity));
        self
    }

    pub fn nonlinear(mut self, nn: usize, func: ResidualFn) -> Self {
        self.nonlinearity = Some(Nonlinearity { nn, func });
        self
    }

    pub fn build(self) -> Result<Element> {
        let nl = [&self.mv, &self.mi, &self.mx, &self.mxd, &self.mq, &self.mu, &self.u0]
            .iter()
            .filter_map(|m| m.as_ref().map(RatMat::nrows))
            .max()
            .unwrap_or(0);
        for m in [&self.mv, &self.mi, &self.mx, &self.mxd, &self.mq, &self.mu, &self.u0] {
            if let Some(m) = m
                && m.nrows() != nl
            {
                return Err(Error::InvalidElement(format!(
                    "constitutive rows disagree: {} vs {nl}",
                    m.nrows()
                )));
            }
        }

        let nb = self
            .pins
            .iter()
            .map(|&(_, b, _)| b + 1)
            .max()
            .unwrap_or(0);
        for branch in 0..nb {
            let plus = self
                .pins
                .iter()
                .filter(|&&(_, b, pol)| b == branch && pol == 1)
                .count();
            let minus = self
                .pins
                .iter()
                .filter(|&&(_, b, pol)| b == branch && pol == -1)
                .count();
            if plus != 1 || minus != 1 {
                return Err(Error::InvalidElement(format!(
                    "branch {branch} needs exactly one positive and one negative pin"
                )));
            }
        }

        let take = |m: Option<RatMat>, rows: usize, cols_hint: Option<usize>| -> Result<RatMat> {
            match m {
                Some(m) => {
                    if let Some(cols) = cols_hint
                        && m.ncols() != cols
                    {
                        return Err(Error::InvalidElement(format!(
                            "column count {} does not match {cols}",
                            m.ncols()
                        )));
                    }
                    Ok(m)
                }
                None => Ok(RatMat::zeros(rows, cols_hint.unwrap_or(0))),
            }
        };

        let nx = self
            .mx
            .as_ref()
            .or(self.mxd.as_ref())
            .map_or(0, RatMat::ncols);
        let nq = self.mq.as_ref().map_or(0, RatMat::ncols);
        let nu = self.mu.as_ref().map_or(0, RatMat::ncols);
        let ny = [&self.pv, &self.pi, &self.px, &self.pxd, &self.pq]
            .iter()
            .filter_map(|m| m.as_ref().map(RatMat::nrows))
            .max()
            .unwrap_or(0);

        let mv = take(self.mv, nl, Some(nb))?;
        let mi = take(self.mi, nl, Some(nb))?;
        let mx = take(self.mx, nl, Some(nx))?;
        let mxd = take(self.mxd, nl, Some(nx))?;
        let mq = take(self.mq, nl, Some(nq))?;
        let mu = take(self.mu, nl, Some(nu))?;
        let u0 = take(self.u0, nl, Some(1))?;
        let pv = take(self.pv, ny, Some(nb))?;
        let pi = take(self.pi, ny, Some(nb))?;
        let px = take(self.px, ny, Some(nx))?;
        let pxd = take(self.pxd, ny, Some(nx))?;
        let pq = take(self.pq, ny, Some(nq))?;
        for (m, rows) in [
            (&pv, ny),
            (&pi, ny),
            (&px, ny),
            (&pxd, ny),
            (&pq, ny),
        ] {
            if m.nrows() != rows {
                return Err(Error::InvalidElement("output rows disagree".into()));
            }
        }

        if nb + nx + nq < nl {
            return Err(Error::InvalidElement(format!(
                "over-determined element: {nl} equations for {} quantities",
                nb + nx + nq
            )));
        }
        let nn = nb + nx + nq - nl;
        match (&self.nonlinearity, nn) {
            (None, 0) => {}
            (None, n) => {
                return Err(Error::InvalidElement(format!(
                    "{n} nonlinear unknowns but no residual supplied"
                )));
            }
            (Some(nlin), n) => {
                if nlin.nn != n {
                    return Err(Error::InvalidElement(format!(
                        "residual covers {} unknowns, matrices imply {n}",
                        nlin.nn
                    )));
                }
            }
        }

        Ok(Element {
            mv: SpRat::from_dense(&mv),
            mi: SpRat::from_dense(&mi),
            mx: SpRat::from_dense(&mx),
            mxd: SpRat::from_dense(&mxd),
            mq: SpRat::from_dense(&mq),
            mu: SpRat::from_dense(&mu),
            u0: SpRat::from_dense(&u0),
            pv: SpRat::from_dense(&pv),
            pi: SpRat::from_dense(&pi),
            px: SpRat::from_dense(&px),
            pxd: SpRat::from_dense(&pxd),
            pq: SpRat::from_dense(&pq),
            pins: self.pins,
            nonlinearity: self.nonlinearity,
        })
    }
}
