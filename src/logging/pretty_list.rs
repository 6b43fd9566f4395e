use std::fmt;

/// Wrapper for &[T] which can be pretty-printed as a markdown-style list.
/// Nice for multiline logs which include lists, like the per-allocator
/// memory statistics.
pub struct PrettyList<'data, T>(pub &'data [T]);

impl<'data, T> fmt::Debug for PrettyList<'data, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\n")?;
        for entry in self.0 {
            if f.alternate() {
                f.write_fmt(format_args!("- {:#?}\n", entry))?;
            } else {
                f.write_fmt(format_args!("- {:?}\n", entry))?;
            }
        }
        Ok(())
    }
}

impl<'data, T> fmt::Display for PrettyList<'data, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\n")?;
        for entry in self.0 {
            f.write_fmt(format_args!("- {}\n", entry))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_one_line_per_entry() {
        let entries = ["block 0", "block 1"];
        let rendered = format!("{}", PrettyList(&entries));
        assert_eq!(rendered, "\n- block 0\n- block 1\n");
    }

    #[test]
    fn debug_quotes_entries() {
        let entries = ["a"];
        let rendered = format!("{:?}", PrettyList(&entries));
        assert_eq!(rendered, "\n- \"a\"\n");
    }
}
