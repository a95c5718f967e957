//! Formula reference scanning
//!
//! Parameter names may contain spaces, so references are located by
//! substring search with identifier boundaries checked at both ends.

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn bounded_matches<'a>(formula: &'a str, name: &'a str) -> impl Iterator<Item = usize> + 'a {
    formula.match_indices(name).filter_map(move |(start, _)| {
        let end = start + name.len();
        let before_ok = formula[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let after_ok = formula[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c));
        (before_ok && after_ok).then_some(start)
    })
}

/// Check whether `formula` refers to the parameter `name`
#[must_use]
pub fn references(formula: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    bounded_matches(formula, name).next().is_some()
}

/// Names from `candidates` that appear in `formula`, excluding `own_name`
pub fn referenced_names<'a, I>(formula: &str, own_name: &str, candidates: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|candidate| *candidate != own_name && references(formula, candidate))
        .collect()
}

/// Check whether the formula is nothing but a reference to `name`
#[must_use]
pub fn is_simple_reference(formula: &str, name: &str) -> bool {
    let trimmed = formula.trim();
    let unwrapped = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')))
        .unwrap_or(trimmed);
    unwrapped.trim() == name
}

/// Replace every bounded reference to `from` with `to`
#[must_use]
pub fn rename_reference(formula: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return formula.to_string();
    }
    let starts: Vec<usize> = bounded_matches(formula, from).collect();
    if starts.is_empty() {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len());
    let mut cursor = 0;
    for start in starts {
        out.push_str(&formula[cursor..start]);
        out.push_str(to);
        cursor = start + from.len();
    }
    out.push_str(&formula[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_respect_boundaries() {
        assert!(references("Width * 2", "Width"));
        assert!(references("Overall Width / 2", "Overall Width"));
        assert!(!references("Widths * 2", "Width"));
        assert!(!references("Total_Width + 1", "Width"));
        assert!(!references("anything", ""));
    }

    #[test]
    fn referenced_names_excludes_self() {
        let names = ["A", "B", "C"];
        let found = referenced_names("A + B", "A", names.iter().copied());
        assert_eq!(found, vec!["B"]);
    }

    #[test]
    fn simple_reference_forms() {
        assert!(is_simple_reference("Depth", "Depth"));
        assert!(is_simple_reference(" [Depth] ", "Depth"));
        assert!(is_simple_reference("(Depth)", "Depth"));
        assert!(!is_simple_reference("Depth * 2", "Depth"));
    }

    #[test]
    fn rename_only_bounded() {
        assert_eq!(
            rename_reference("W + W2 + (W)", "W", "Width"),
            "Width + W2 + (Width)"
        );
        assert_eq!(rename_reference("H", "X", "Y"), "H");
    }
}
