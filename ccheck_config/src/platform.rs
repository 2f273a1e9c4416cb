use serde::Deserialize;

/// Default signedness of plain `char` on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharSign {
    Signed,
    Unsigned,
}

/// Bit widths of the fundamental types on the analyzed target.
///
/// All sizes are in bytes; `char_bit` is the number of bits in a byte. The
/// symbol database uses these to compute `sizeof` hints and to size the
/// `unknown_int`-free integer types.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Platform {
    pub char_bit: u32,
    pub sizeof_bool: u32,
    pub sizeof_short: u32,
    pub sizeof_int: u32,
    pub sizeof_long: u32,
    pub sizeof_long_long: u32,
    pub sizeof_float: u32,
    pub sizeof_double: u32,
    pub sizeof_long_double: u32,
    pub sizeof_wchar_t: u32,
    pub sizeof_size_t: u32,
    pub sizeof_pointer: u32,
    pub default_sign: CharSign,
    pub windows: bool,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::unix64()
    }
}

impl Platform {
    pub fn unix32() -> Self {
        Platform {
            char_bit: 8,
            sizeof_bool: 1,
            sizeof_short: 2,
            sizeof_int: 4,
            sizeof_long: 4,
            sizeof_long_long: 8,
            sizeof_float: 4,
            sizeof_double: 8,
            sizeof_long_double: 12,
            sizeof_wchar_t: 4,
            sizeof_size_t: 4,
            sizeof_pointer: 4,
            default_sign: CharSign::Signed,
            windows: false,
        }
    }

    pub fn unix64() -> Self {
        Platform {
            sizeof_long: 8,
            sizeof_long_double: 16,
            sizeof_size_t: 8,
            sizeof_pointer: 8,
            ..Platform::unix32()
        }
    }

    pub fn win32a() -> Self {
        Platform {
            sizeof_long_double: 8,
            sizeof_wchar_t: 2,
            windows: true,
            ..Platform::unix32()
        }
    }

    pub fn win64() -> Self {
        Platform {
            sizeof_long_double: 8,
            sizeof_wchar_t: 2,
            sizeof_size_t: 8,
            sizeof_pointer: 8,
            windows: true,
            ..Platform::unix32()
        }
    }

    /// Width in bits of a `long` on this platform.
    pub fn long_bit(&self) -> u32 {
        self.char_bit * self.sizeof_long
    }

    /// Width in bits of an `int` on this platform.
    pub fn int_bit(&self) -> u32 {
        self.char_bit * self.sizeof_int
    }

    pub fn is_windows(&self) -> bool {
        self.windows
    }

    /// Largest value representable in `bits` bits with the given signedness.
    pub fn max_value(bits: u32, signed: bool) -> i128 {
        let bits = bits.min(126);
        if signed {
            (1i128 << (bits - 1)) - 1
        } else {
            (1i128 << bits) - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_widths() {
        assert_eq!(Platform::unix64().long_bit(), 64);
        assert_eq!(Platform::unix32().long_bit(), 32);
        assert_eq!(Platform::win64().long_bit(), 32);
        assert!(Platform::win64().is_windows());
        assert_eq!(Platform::win64().sizeof_pointer, 8);
    }

    #[test]
    fn max_values() {
        assert_eq!(Platform::max_value(8, true), 127);
        assert_eq!(Platform::max_value(8, false), 255);
        assert_eq!(Platform::max_value(32, true), 2147483647);
    }
}
