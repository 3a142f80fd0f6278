//! Feature path bookkeeping for path-dependent TreeSHAP.
//!
//! A [`PathState`] records, for every split on the way from the root to the
//! current node, which feature was split on and what fraction of the
//! coalitions with and without that feature still reach the node. The
//! permutation weights let the Shapley weight of each feature be read off at
//! a leaf without enumerating subsets (Lundberg et al., 2020, Algorithm 2).

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathElement {
    /// Split feature, or -1 for the root placeholder.
    pub feature: i32,
    /// Fraction of "feature absent" coalitions flowing down this path.
    pub zero_fraction: f64,
    /// Fraction of "feature present" coalitions flowing down this path (0 or 1).
    pub one_fraction: f64,
    /// Permutation weight.
    pub pweight: f64,
}

/// The unique features seen on the current root-to-node path.
#[derive(Clone, Debug, Default)]
pub struct PathState {
    elements: Vec<PathElement>,
}

impl PathState {
    pub fn with_capacity(max_depth: usize) -> Self {
        Self {
            elements: Vec::with_capacity(max_depth + 2),
        }
    }

    /// Number of elements, including the root placeholder.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn element(&self, idx: usize) -> &PathElement {
        &self.elements[idx]
    }

    /// Position of `feature` on the path, ignoring the root placeholder.
    pub fn find(&self, feature: i32) -> Option<usize> {
        self.elements
            .iter()
            .skip(1)
            .position(|e| e.feature == feature)
            .map(|pos| pos + 1)
    }

    /// Append a split and update the permutation weights.
    pub fn extend(&mut self, zero_fraction: f64, one_fraction: f64, feature: i32) {
        let depth = self.elements.len();
        self.elements.push(PathElement {
            feature,
            zero_fraction,
            one_fraction,
            pweight: if depth == 0 { 1.0 } else { 0.0 },
        });

        let denom = (depth + 1) as f64;
        for i in (0..depth).rev() {
            let w = self.elements[i].pweight;
            self.elements[i + 1].pweight += one_fraction * w * (i + 1) as f64 / denom;
            self.elements[i].pweight = zero_fraction * w * (depth - i) as f64 / denom;
        }
    }

    /// Remove element `idx`, undoing its effect on the permutation weights.
    pub fn unwind(&mut self, idx: usize) {
        let depth = self.elements.len() - 1;
        let one_fraction = self.elements[idx].one_fraction;
        let zero_fraction = self.elements[idx].zero_fraction;
        let denom = (depth + 1) as f64;
        let mut next_one_portion = self.elements[depth].pweight;

        for i in (0..depth).rev() {
            if one_fraction != 0.0 {
                let tmp = self.elements[i].pweight;
                self.elements[i].pweight =
                    next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                next_one_portion = tmp
                    - self.elements[i].pweight * zero_fraction * (depth - i) as f64 / denom;
            } else {
                self.elements[i].pweight = self.elements[i].pweight * denom
                    / (zero_fraction * (depth - i) as f64);
            }
        }

        // Only the split data shifts; the recomputed weights stay in place.
        for i in idx..depth {
            let next = self.elements[i + 1];
            let e = &mut self.elements[i];
            e.feature = next.feature;
            e.zero_fraction = next.zero_fraction;
            e.one_fraction = next.one_fraction;
        }
        self.elements.truncate(depth);
    }

    /// Total permutation weight the path would have with element `idx` removed.
    pub fn unwound_sum(&self, idx: usize) -> f64 {
        let depth = self.elements.len() - 1;
        let one_fraction = self.elements[idx].one_fraction;
        let zero_fraction = self.elements[idx].zero_fraction;
        let denom = (depth + 1) as f64;
        let mut total = 0.0;

        if one_fraction != 0.0 {
            let mut next_one_portion = self.elements[depth].pweight;
            for i in (0..depth).rev() {
                let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                total += tmp;
                next_one_portion = self.elements[i].pweight
                    - tmp * zero_fraction * (depth - i) as f64 / denom;
            }
        } else {
            for i in (0..depth).rev() {
                total += self.elements[i].pweight / (zero_fraction * (depth - i) as f64 / denom);
            }
        }
        total
    }
}
