use crate::prelude::*;

/// Handle returned by [`Circuit::add`], used to address pins in
/// [`Circuit::connect`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ElementId(pub(crate) usize);

/// An ordered bag of elements plus pin connectivity.
///
/// Nets are equivalence classes of pins under `connect`, maintained with a
/// union-find over pin slots. The circuit exposes the aggregated
/// block-diagonal element matrices and the topology matrices derived from
/// the net-branch incidence.
pub struct Circuit {
    pub elements: Vec<Element>,
    pin_slot: Vec<Vec<usize>>, // per element: pin index → union-find slot
    parent: Vec<usize>,
}

impl Default for Circuit {
    fn default() -> Self {
        Circuit::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        Circuit {
            elements: Vec::new(),
            pin_slot: Vec::new(),
            parent: Vec::new(),
        }
    }

    pub fn add(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        let mut slots = Vec::with_capacity(element.pins.len());
        for _ in &element.pins {
            slots.push(self.parent.len());
            self.parent.push(self.parent.len());
        }
        self.pin_slot.push(slots);
        self.elements.push(element);
        id
    }

    /// Join the named pins into one net.
    pub fn connect(&mut self, pins: &[(ElementId, &str)]) -> Result<()> {
        if pins.len() < 2 {
            return Err(Error::EmptyConnection);
        }
        let mut first: Option<usize> = None;
        for &(ElementId(e), name) in pins {
            let elem = &self.elements[e];
            let matching: Vec<usize> = elem
                .pins
                .iter()
                .enumerate()
                .filter(|(_, (n, _, _))| n == name)
                .map(|(i, _)| i)
                .collect();
            if matching.is_empty() {
                return Err(Error::UnknownPin {
                    element: e,
                    pin: name.to_string(),
                });
            }
            for pin_idx in matching {
                let slot = self.pin_slot[e][pin_idx];
                match first {
                    None => first = Some(slot),
                    Some(root) => self.union(root, slot),
                }
            }
        }
        Ok(())
    }

    fn find(&self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            slot = self.parent[slot];
        }
        slot
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }

    // aggregated dimensions

    pub fn nb(&self) -> usize {
        self.elements.iter().map(Element::nb).sum()
    }

    pub fn nl(&self) -> usize {
        self.elements.iter().map(Element::nl).sum()
    }

    pub fn nx(&self) -> usize {
        self.elements.iter().map(Element::nx).sum()
    }

    pub fn nq(&self) -> usize {
        self.elements.iter().map(Element::nq).sum()
    }

    pub fn nu(&self) -> usize {
        self.elements.iter().map(Element::nu).sum()
    }

    pub fn ny(&self) -> usize {
        self.elements.iter().map(Element::ny).sum()
    }

    pub fn nn(&self) -> usize {
        self.elements.iter().map(Element::nn).sum()
    }

    /// Per-element offsets into the stacked q rows.
    pub fn q_offsets(&self) -> Vec<usize> {
        let mut offs = Vec::with_capacity(self.elements.len());
        let mut acc = 0;
        for e in &self.elements {
            offs.push(acc);
            acc += e.nq();
        }
        offs
    }

    // block-diagonal stacks of the element matrices

    pub fn mv(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mv).collect::<Vec<_>>())
    }

    pub fn mi(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mi).collect::<Vec<_>>())
    }

    pub fn mx(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mx).collect::<Vec<_>>())
    }

    pub fn mxd(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mxd).collect::<Vec<_>>())
    }

    pub fn mq(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mq).collect::<Vec<_>>())
    }

    pub fn mu(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.mu).collect::<Vec<_>>())
    }

    pub fn u0(&self) -> SpRat {
        if self.elements.is_empty() {
            return SpRat::zeros(0, 1);
        }
        SpRat::vcat(&self.elements.iter().map(|e| &e.u0).collect::<Vec<_>>())
    }

    pub fn pv(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.pv).collect::<Vec<_>>())
    }

    pub fn pi(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.pi).collect::<Vec<_>>())
    }

    pub fn px(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.px).collect::<Vec<_>>())
    }

    pub fn pxd(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.pxd).collect::<Vec<_>>())
    }

    pub fn pq(&self) -> SpRat {
        SpRat::block_diag(&self.elements.iter().map(|e| &e.pq).collect::<Vec<_>>())
    }

    /// Net-branch incidence: +1 where a branch leaves a net through its
    /// positive pin, −1 where it returns.
    pub fn incidence(&self) -> Vec<Vec<i64>> {
        // compact net ids from union-find roots
        let mut net_of_root = std::collections::HashMap::new();
        let mut nets = 0usize;
        let mut branch_off = 0usize;
        let mut entries: Vec<(usize, usize, i64)> = Vec::new();
        for (e, elem) in self.elements.iter().enumerate() {
            for (pin_idx, &(_, branch, pol)) in elem.pins.iter().enumerate() {
                let root = self.find(self.pin_slot[e][pin_idx]);
                let net = *net_of_root.entry(root).or_insert_with(|| {
                    let n = nets;
                    nets += 1;
                    n
                });
                entries.push((net, branch_off + branch, pol));
            }
            branch_off += elem.nb();
        }
        let mut m = vec![vec![0i64; branch_off]; nets];
        for (net, branch, pol) in entries {
            m[net][branch] += pol;
        }
        m
    }

    /// Topology matrices `(Tv, Ti)` with `Tv·v = 0` (loops), `Ti·i = 0`
    /// (cuts) and `Tv·Tiᵀ = 0`, computed by exact integer elimination of the
    /// incidence matrix.
    pub fn topomat(&self) -> (SpRat, SpRat) {
        let mut m = self.incidence();
        let nb = self.nb();
        let nrows = m.len();
        let mut tree = vec![false; nb];
        let mut tree_cols: Vec<usize> = Vec::new();
        let mut row = 0usize;
        for col in 0..nb {
            let Some(pivot) = (row..nrows).find(|&r| m[r][col] != 0) else {
                continue;
            };
            tree[col] = true;
            tree_cols.push(col);
            m.swap(row, pivot);
            if m[row][col] < 0 {
                for v in &mut m[row] {
                    *v = -*v;
                }
            }
            let pivot_row = m[row].clone();
            for (r, mrow) in m.iter_mut().enumerate() {
                let scale = mrow[col];
                if r != row && scale != 0 {
                    for (mc, pc) in mrow.iter_mut().zip(pivot_row.iter()) {
                        *mc -= scale * pc;
                    }
                }
            }
            row += 1;
        }
        let rank = row;

        let mut ti_triplets = Vec::new();
        for r in 0..rank {
            for c in 0..nb {
                if m[r][c] != 0 {
                    ti_triplets.push((r, c, rat(m[r][c])));
                }
            }
        }
        let ti = SpRat::from_triplets(rank, nb, ti_triplets);

        let cotree: Vec<usize> = (0..nb).filter(|&c| !tree[c]).collect();
        let mut tv_triplets = Vec::new();
        for (ci, &c) in cotree.iter().enumerate() {
            tv_triplets.push((ci, c, rat(1)));
            for (ri, &tc) in tree_cols.iter().enumerate() {
                if m[ri][c] != 0 {
                    tv_triplets.push((ci, tc, rat(-m[ri][c])));
                }
            }
        }
        let tv = SpRat::from_triplets(cotree.len(), nb, tv_triplets);
        (tv, ti)
    }
}
