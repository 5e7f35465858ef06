use core::{
    fmt::{Display, Formatter, Result},
    marker::PhantomData,
};

/// Renders a byte count with a binary unit suffix, e.g. `12 KiB`.
pub struct Fmt<T> {
    length: u64,
    phantom: PhantomData<T>,
}

impl<T> From<u64> for Fmt<T> {
    fn from(value: u64) -> Self {
        Self {
            length: value,
            phantom: PhantomData,
        }
    }
}

impl<T> Display for Fmt<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.length {
            b if b < 10 * 1024 => write!(f, "{b} B"),
            kb if kb < 10 * 1024u64.pow(2) => write!(f, "{} KiB", kb >> 10),
            mb if mb < 10 * 1024u64.pow(3) => write!(f, "{} MiB", mb >> 20),
            gb => write!(f, "{} GiB", gb >> 30),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Fmt;
    use std::format;

    #[test]
    fn fmt_test() {
        assert_eq!(format!("{}", Fmt::<u64>::from(4823)), "4823 B");
        assert_eq!(format!("{}", Fmt::<u64>::from(0x3000)), "12 KiB");
        assert_eq!(format!("{}", Fmt::<u64>::from(0x0800_0000)), "128 MiB");
        assert_eq!(format!("{}", Fmt::<u64>::from(0x40_0000_0000)), "256 GiB");
    }
}
