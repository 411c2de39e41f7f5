//! Call signature parsing.
//!
//! A signature is the engine-dialect method spelling, e.g. `add(_,_)`,
//! `count`, or `[_]=(_)`. Each `_` is one parameter slot. The register
//! file convention reserves a single byte of width for the parameter
//! count, so arity is capped at [`MAX_ARITY`]; exceeding the cap is a
//! local range error at construction time, never a foreign-engine fault.

use crate::error::{InteropError, InteropResult};

/// Maximum number of parameters a callable may take.
pub const MAX_ARITY: usize = 16;

/// A validated call signature with its parsed arity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    text: String,
    arity: u8,
}

impl Signature {
    /// Parse and validate a signature.
    ///
    /// Arity is the number of `_` parameter markers in the text. Returns
    /// `ArgumentRange` for an empty signature or one with more than
    /// [`MAX_ARITY`] parameters.
    pub fn parse(text: &str) -> InteropResult<Signature> {
        if text.is_empty() {
            return Err(InteropError::ArgumentRange(
                "signature must not be empty".to_string(),
            ));
        }
        let arity = text.bytes().filter(|&b| b == b'_').count();
        if arity > MAX_ARITY {
            return Err(InteropError::ArgumentRange(format!(
                "signature '{}' takes {} parameters, maximum is {}",
                text, arity, MAX_ARITY
            )));
        }
        Ok(Signature {
            text: text.to_string(),
            arity: arity as u8,
        })
    }

    /// Build the `call(_,..)` signature for invoking a function value
    /// with `arity` arguments.
    pub fn for_call(arity: usize) -> InteropResult<Signature> {
        if arity > MAX_ARITY {
            return Err(InteropError::ArgumentRange(format!(
                "call arity {} exceeds maximum {}",
                arity, MAX_ARITY
            )));
        }
        let text = if arity == 0 {
            "call()".to_string()
        } else {
            let mut text = String::from("call(");
            for i in 0..arity {
                if i > 0 {
                    text.push(',');
                }
                text.push('_');
            }
            text.push(')');
            text
        };
        Ok(Signature {
            text,
            arity: arity as u8,
        })
    }

    /// The signature text as the engine expects it.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of parameters the callable consumes.
    pub fn arity(&self) -> usize {
        self.arity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arity() {
        assert_eq!(Signature::parse("count").unwrap().arity(), 0);
        assert_eq!(Signature::parse("add(_,_)").unwrap().arity(), 2);
        assert_eq!(Signature::parse("[_]=(_)").unwrap().arity(), 2);
    }

    #[test]
    fn test_arity_boundary() {
        // Exactly 16 parameters succeeds.
        let sig = format!("f({})", vec!["_"; 16].join(","));
        assert_eq!(Signature::parse(&sig).unwrap().arity(), 16);

        // 17 raises ArgumentRange.
        let sig = format!("f({})", vec!["_"; 17].join(","));
        assert!(matches!(
            Signature::parse(&sig),
            Err(InteropError::ArgumentRange(_))
        ));
    }

    #[test]
    fn test_empty_signature_rejected() {
        assert!(matches!(
            Signature::parse(""),
            Err(InteropError::ArgumentRange(_))
        ));
    }

    #[test]
    fn test_for_call() {
        assert_eq!(Signature::for_call(0).unwrap().text(), "call()");
        assert_eq!(Signature::for_call(3).unwrap().text(), "call(_,_,_)");
        assert_eq!(Signature::for_call(3).unwrap().arity(), 3);
        assert!(Signature::for_call(17).is_err());
    }
}
