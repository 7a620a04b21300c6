// Build configuration shared by every step of a script.

/// Default ceiling on flakes per machine, root included.
pub const DEFAULT_MAX_FLAKES: usize = 64;

/// Options controlling how a [`Script`](crate::Script) builds its machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of flakes in one machine, including the root.
    /// Growing past it fails the step with `TooManyFlakes`.
    pub max_flakes: usize,
    /// Run [`Machine::check_invariants`](crate::Machine::check_invariants)
    /// after every step. A violation interrupts the script. Off by default.
    pub validate: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_flakes: DEFAULT_MAX_FLAKES,
            validate: false,
        }
    }
}

impl BuildOptions {
    pub fn with_max_flakes(mut self, max_flakes: usize) -> Self {
        self.max_flakes = max_flakes;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = BuildOptions::default();
        assert_eq!(options.max_flakes, DEFAULT_MAX_FLAKES);
        assert!(!options.validate);
    }

    #[test]
    fn builder_methods() {
        let options = BuildOptions::default()
            .with_max_flakes(8)
            .with_validation(true);
        assert_eq!(options.max_flakes, 8);
        assert!(options.validate);
    }
}
