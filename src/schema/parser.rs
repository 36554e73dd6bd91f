//! Type Schema Parser
//!
//! Grammar:
//!
//! ```text
//! type  := IDENT ("." IDENT)* ("[" type ("," type)* "]")?
//! ```
//!
//! Only top-level commas split arguments, so nested generics such as
//! `Dict[str, List[int]]` parse recursively. The input string itself is
//! taken verbatim; whitespace is only tolerated around bracketed arguments.

use thiserror::Error;

use super::node::TypeNode;

/// Names that are always leaves and skip bracket scanning
const BARE_NAMES: &[&str] = &["str", "int", "float", "bool", "bytes", "None", "Any"];

/// Guard against pathological nesting from a misbehaving backend
const MAX_DEPTH: usize = 64;

/// Schema parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Malformed type schema '{input}': {reason}")]
    MalformedType { input: String, reason: String },
}

impl SchemaError {
    fn malformed(input: &str, reason: impl Into<String>) -> Self {
        SchemaError::MalformedType {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Parse a type schema string into a [`TypeNode`] tree
pub fn parse(text: &str) -> SchemaResult<TypeNode> {
    parse_at_depth(text, 1)
}

fn parse_at_depth(text: &str, depth: usize) -> SchemaResult<TypeNode> {
    if BARE_NAMES.contains(&text) {
        return Ok(TypeNode::leaf(text));
    }

    if text.is_empty() {
        return Err(SchemaError::malformed(text, "empty type"));
    }

    if depth > MAX_DEPTH {
        return Err(SchemaError::malformed(
            text,
            format!("nesting deeper than {} levels", MAX_DEPTH),
        ));
    }

    let Some(open) = text.find('[') else {
        if text.contains(']') {
            return Err(SchemaError::malformed(text, "unmatched ']'"));
        }
        validate_name(text)?;
        return Ok(TypeNode::leaf(text));
    };

    let name = &text[..open];
    validate_name(name).map_err(|_| SchemaError::malformed(text, format!("invalid type name '{}'", name)))?;

    let close = matching_bracket(text, open)
        .ok_or_else(|| SchemaError::malformed(text, "unmatched '['"))?;
    if close != text.len() - 1 {
        return Err(SchemaError::malformed(text, "unexpected text after ']'"));
    }

    let inner = &text[open + 1..close];
    if inner.trim().is_empty() {
        return Err(SchemaError::malformed(text, "empty argument list"));
    }

    let args = split_top_level(inner)
        .into_iter()
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                Err(SchemaError::malformed(text, "empty argument"))
            } else {
                parse_at_depth(piece, depth + 1)
            }
        })
        .collect::<SchemaResult<Vec<_>>>()?;

    Ok(TypeNode::generic(name, args))
}

/// Byte index of the `]` closing the `[` at `open`
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not nested inside brackets
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&inner[start..]);
    pieces
}

/// Check `IDENT ("." IDENT)*`
fn validate_name(name: &str) -> SchemaResult<()> {
    if name.is_empty() {
        return Err(SchemaError::malformed(name, "missing type name"));
    }

    for segment in name.split('.') {
        let mut chars = segment.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };
        if !valid {
            return Err(SchemaError::malformed(
                name,
                format!("invalid identifier segment '{}'", segment),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> TypeNode {
        TypeNode::leaf(name)
    }

    #[test]
    fn test_parse_bare_name() {
        assert_eq!(parse("str").unwrap(), leaf("str"));
        assert_eq!(parse("MyModel").unwrap(), leaf("MyModel"));
    }

    #[test]
    fn test_parse_dotted_generic() {
        let node = parse("typing.List[ssui.base.Image]").unwrap();
        assert_eq!(
            node,
            TypeNode::generic("typing.List", vec![leaf("ssui.base.Image")])
        );
    }

    #[test]
    fn test_parse_nested_generics() {
        let node = parse("Dict[str, List[int]]").unwrap();
        assert_eq!(
            node,
            TypeNode::generic(
                "Dict",
                vec![leaf("str"), TypeNode::generic("List", vec![leaf("int")])]
            )
        );
    }

    #[test]
    fn test_parse_splits_only_top_level_commas() {
        let node = parse("Tuple[Dict[str, int], List[Dict[str, float]], bool]").unwrap();
        assert_eq!(node.args.len(), 3);
        assert_eq!(node.args[0].args.len(), 2);
        assert_eq!(node.args[1].args[0].name, "Dict");
        assert_eq!(node.args[2], leaf("bool"));
    }

    #[test]
    fn test_bare_names_agree_with_grammar() {
        for name in BARE_NAMES {
            assert!(validate_name(name).is_ok());
            assert_eq!(parse(name).unwrap(), leaf(name));
        }
    }

    #[test]
    fn test_malformed_inputs() {
        for bad in [
            "", "Foo[", "Foo]", "Foo[]", "Foo[ ]", "Foo[a,,b]", "Foo[a,]", "Foo[a]x", "Foo[a]]",
            "[int]", "a..b", ".a", "a.", "1abc", "List[int", " str", "str ", "Foo[Bar[]]",
            "Ünïcode", "List[名前]",
        ] {
            let result = parse(bad);
            assert!(
                matches!(result, Err(SchemaError::MalformedType { .. })),
                "expected '{}' to be malformed, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_round_trip_through_display() {
        let trees = vec![
            leaf("int"),
            TypeNode::generic("typing.Optional", vec![leaf("ssui.base.Image")]),
            TypeNode::generic(
                "typing.Dict",
                vec![
                    leaf("str"),
                    TypeNode::generic(
                        "typing.List",
                        vec![TypeNode::generic("typing.Tuple", vec![leaf("int"), leaf("float")])],
                    ),
                ],
            ),
        ];

        for tree in trees {
            assert_eq!(parse(&tree.to_string()).unwrap(), tree);
        }
    }

    /// Every tree up to `depth` levels over `names`, with 0 to 2 arguments
    fn all_trees(names: &[&str], depth: usize) -> Vec<TypeNode> {
        let mut trees: Vec<TypeNode> = names.iter().map(|n| leaf(n)).collect();
        if depth <= 1 {
            return trees;
        }

        let smaller = all_trees(names, depth - 1);
        for name in names {
            for a in &smaller {
                trees.push(TypeNode::generic(*name, vec![a.clone()]));
                for b in &smaller {
                    trees.push(TypeNode::generic(*name, vec![a.clone(), b.clone()]));
                }
            }
        }
        trees
    }

    #[test]
    fn test_round_trip_all_small_trees() {
        let trees = all_trees(&["str", "_T0", "typing.List"], 3);
        // 3 leaves, 3 * (3 + 9) = 36 at depth 2, 3 * (39 + 39 * 39) at depth 3
        assert_eq!(trees.len(), 3 + 3 * (39 + 39 * 39));

        for tree in trees {
            let text = tree.to_string();
            assert_eq!(parse(&text).unwrap(), tree, "round trip of {}", text);
        }
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut text = String::from("int");
        for _ in 0..(MAX_DEPTH + 1) {
            text = format!("List[{}]", text);
        }
        assert!(parse(&text).is_err());
    }
}
