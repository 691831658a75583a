// Simple string error, used for plumbing (io, csv, argument) failures
// that only ever need to be shown to the user.
pub type SError = String;

/// Writes a line to a WriteHandle (or any io::Write), ignoring failures.
/// User-facing errors and warnings go through this, rather than eprintln,
/// so that they can be captured by tests.
#[macro_export]
macro_rules! write_errln {
    ($w:expr, $($arg:tt)*) => {{
        use std::io::Write as _;
        let _ = $w.write_fmt(format_args!("{}\n", format_args!($($arg)*)));
    }};
}

/// Returns the trimmed value, or None if it was empty after trimming.
pub fn non_empty_trimmed(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use crate::util::rw::WriteHandle;

    use super::non_empty_trimmed;

    #[test]
    fn test_write_errln() {
        let (mut h, buff) = WriteHandle::string_buff_write_handle();
        write_errln!(h, "Warning: {} {}", "a", 1);
        write_errln!(h, "second");
        assert_eq!(buff.borrow().as_str(), "Warning: a 1\nsecond\n");
    }

    fn warn_through(err_stream: &mut WriteHandle) {
        write_errln!(err_stream, "through a &mut param");
    }

    #[test]
    fn test_write_errln_mut_ref_param() {
        let (mut h, buff) = WriteHandle::string_buff_write_handle();
        warn_through(&mut h);
        assert_eq!(buff.borrow().as_str(), "through a &mut param\n");
    }

    #[test]
    fn test_non_empty_trimmed() {
        assert_eq!(non_empty_trimmed("  x "), Some("x"));
        assert_eq!(non_empty_trimmed("   "), None);
        assert_eq!(non_empty_trimmed(""), None);
    }
}
