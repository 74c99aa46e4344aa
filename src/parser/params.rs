//! CSI/DCS parameter storage
//!
//! Accumulates the numeric parameters of a control sequence digit by digit.
//! Parameters are semicolon separated; an empty parameter resolves to 0
//! (zero default mode) while a separate "given" flag records whether digits
//! were actually seen, for handlers that must distinguish an explicit 0
//! from an omitted value. Colons introduce sub-parameters attached to the
//! preceding parameter; empty sub-parameters resolve to -1 (no ZDM).
//!
//! Storage is bounded: parameters past the limit are silently dropped for
//! the remainder of the sequence, and digit accumulation saturates, so
//! adversarial input cannot grow memory or overflow.

/// Maximum stored parameters per sequence
pub const MAX_PARAMS: usize = 32;
/// Maximum stored sub-parameters per sequence
pub const MAX_SUB_PARAMS: usize = 32;
/// Saturation bound for a single parameter value
pub const PARAM_VALUE_LIMIT: i32 = i32::MAX;

/// Parameter accumulator, reused across sequences
#[derive(Debug, Clone)]
pub struct Params {
    params: Vec<i32>,
    /// Bit per parameter: digits were explicitly present
    given: u32,
    sub_params: Vec<i32>,
    /// Sub-parameter range per parameter: (start, end) into `sub_params`
    sub_idx: Vec<(u8, u8)>,
    /// The last pushed value was a sub-parameter
    in_sub: bool,
    reject_digits: bool,
    reject_sub_digits: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

impl Params {
    pub fn new() -> Self {
        Self {
            params: Vec::with_capacity(MAX_PARAMS),
            given: 0,
            sub_params: Vec::with_capacity(MAX_SUB_PARAMS),
            sub_idx: Vec::with_capacity(MAX_PARAMS),
            in_sub: false,
            reject_digits: false,
            reject_sub_digits: false,
        }
    }

    /// Build from a test-friendly representation: top-level values with
    /// optional sub-parameter lists
    pub fn from_slices(values: &[(i32, &[i32])]) -> Self {
        let mut params = Params::new();
        for (value, subs) in values {
            params.add_param(*value);
            for sub in *subs {
                params.add_sub_param(*sub);
            }
        }
        params
    }

    pub fn reset(&mut self) {
        self.params.clear();
        self.given = 0;
        self.sub_params.clear();
        self.sub_idx.clear();
        self.in_sub = false;
        self.reject_digits = false;
        self.reject_sub_digits = false;
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Start a new parameter (`;` or sequence start)
    pub fn add_param(&mut self, value: i32) {
        self.in_sub = false;
        if self.params.len() >= MAX_PARAMS {
            self.reject_digits = true;
            return;
        }
        let sub_end = self.sub_params.len() as u8;
        self.params.push(value);
        self.sub_idx.push((sub_end, sub_end));
    }

    /// Start a new sub-parameter attached to the current parameter (`:`)
    pub fn add_sub_param(&mut self, value: i32) {
        self.in_sub = true;
        if self.params.is_empty()
            || self.params.len() > MAX_PARAMS
            || self.sub_params.len() >= MAX_SUB_PARAMS
        {
            self.reject_sub_digits = true;
            return;
        }
        // sub-params must stay contiguous per parameter; the parser only
        // ever appends to the most recent one
        self.sub_params.push(value);
        if let Some(last) = self.sub_idx.last_mut() {
            last.1 += 1;
        }
    }

    /// Account one decimal digit to the current (sub-)parameter
    pub fn add_digit(&mut self, digit: u8) {
        debug_assert!(digit <= 9);
        if self.in_sub {
            if self.reject_sub_digits || self.reject_digits {
                return;
            }
            if let Some(last) = self.sub_params.last_mut() {
                *last = if *last < 0 {
                    digit as i32
                } else {
                    last.saturating_mul(10).saturating_add(digit as i32)
                };
            }
        } else {
            if self.reject_digits {
                return;
            }
            if let Some(last) = self.params.last_mut() {
                *last = last
                    .saturating_mul(10)
                    .saturating_add(digit as i32)
                    .min(PARAM_VALUE_LIMIT);
                let idx = self.params.len() - 1;
                if idx < 32 {
                    self.given |= 1 << idx;
                }
            }
        }
    }

    /// Parameter value, 0 for out-of-range indices
    pub fn get(&self, idx: usize) -> i32 {
        self.params.get(idx).copied().unwrap_or(0)
    }

    /// Parameter value with a default applied for 0/omitted (the common
    /// VT rule that a 0 or missing count means the default)
    pub fn get_or(&self, idx: usize, default: i32) -> i32 {
        match self.params.get(idx) {
            Some(&v) if v != 0 => v,
            _ => default,
        }
    }

    /// Whether digits were explicitly present for the parameter (an
    /// explicit `0` counts; a bare `;` does not)
    pub fn is_given(&self, idx: usize) -> bool {
        idx < 32 && self.given & (1 << idx) != 0
    }

    pub fn has_sub_params(&self, idx: usize) -> bool {
        self.sub_idx
            .get(idx)
            .map(|&(s, e)| e > s)
            .unwrap_or(false)
    }

    /// Sub-parameters attached to the parameter at `idx`
    pub fn sub_params(&self, idx: usize) -> &[i32] {
        match self.sub_idx.get(idx) {
            Some(&(s, e)) if e > s => &self.sub_params[s as usize..e as usize],
            _ => &[],
        }
    }

    /// Top-level values as a slice (sub-parameters not included)
    pub fn as_slice(&self) -> &[i32] {
        &self.params
    }

    /// Flatten to `(value, sub-parameters)` pairs for assertions
    pub fn to_pairs(&self) -> Vec<(i32, Vec<i32>)> {
        (0..self.len())
            .map(|i| (self.get(i), self.sub_params(i).to_vec()))
            .collect()
    }
}
