pub trait CaseInsensitiveStringExt {
    fn strip_prefix_ignore_ascii_case<'a>(&'a self, prefix: &str) -> Option<&'a str>;
}

impl CaseInsensitiveStringExt for str {
    fn strip_prefix_ignore_ascii_case<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        // `get` returns None when the prefix length splits a multi-byte character
        let my_prefix = self.get(..prefix.len())?;

        if my_prefix.eq_ignore_ascii_case(prefix) {
            Some(&self[prefix.len()..])
        } else {
            None
        }
    }
}
