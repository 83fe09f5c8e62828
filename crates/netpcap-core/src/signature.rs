//! Compact binding signatures.
//!
//! A signature names a native function (or an upcall method) together with its
//! C types, one letter per type:
//!
//! ```text
//! pcap_setfilter(AA)I      int pcap_setfilter(pcap_t *p, struct bpf_program *fp)
//! getpid()I;               pid_t getpid(void)
//! pcap_breakloop(A)V       void pcap_breakloop(pcap_t *p)
//! ```
//!
//! | Tag | Type    |
//! |-----|---------|
//! | `A` | pointer |
//! | `B` | char    |
//! | `S` | short   |
//! | `I` | int     |
//! | `J` | long    |
//! | `F` | float   |
//! | `D` | double  |
//! | `V` | void (return only) |
//!
//! The grammar is `IDENT "(" TAG* ")" TAG [";"]`, matched against the whole
//! input after trimming surrounding whitespace.

use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use crate::ctype::CType;
use crate::descriptor::CallDescriptor;
use crate::error::SignatureError;

/// A parsed binding signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    descriptor: CallDescriptor,
}

impl Signature {
    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        Parser::new(signature.trim()).parse()
    }

    /// Symbol name or upcall method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    pub fn args(&self) -> &[CType] {
        self.descriptor.args()
    }

    pub fn return_type(&self) -> CType {
        self.descriptor.return_type()
    }

    pub fn into_parts(self) -> (String, CallDescriptor) {
        (self.name, self.descriptor)
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Parser<'s> {
    input: &'s str,
    chars: Peekable<CharIndices<'s>>,
}

impl<'s> Parser<'s> {
    fn new(input: &'s str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn parse(mut self) -> Result<Signature, SignatureError> {
        if self.input.is_empty() {
            return Err(SignatureError::Empty);
        }

        let name = self.identifier()?;

        match self.chars.next() {
            Some((_, '(')) => {}
            Some((position, _)) => return Err(SignatureError::MissingOpenParen { position }),
            None => {
                return Err(SignatureError::MissingOpenParen {
                    position: self.input.len(),
                });
            }
        }

        let mut args = Vec::new();
        loop {
            match self.chars.next() {
                Some((_, ')')) => break,
                Some((position, tag)) => match CType::from_tag(tag) {
                    Some(CType::Void) => {
                        return Err(SignatureError::VoidArgument { index: args.len() });
                    }
                    Some(ctype) => args.push(ctype),
                    None => return Err(SignatureError::UnknownTag { tag, position }),
                },
                None => return Err(SignatureError::UnterminatedArgs),
            }
        }

        let ret = match self.chars.next() {
            Some((position, tag)) => {
                CType::from_tag(tag).ok_or(SignatureError::UnknownTag { tag, position })?
            }
            None => return Err(SignatureError::MissingReturn),
        };

        self.chars.next_if(|&(_, c)| c == ';');
        if self.chars.peek().is_some() {
            let position = self.position();
            return Err(SignatureError::TrailingInput { position });
        }

        Ok(Signature {
            name: name.to_string(),
            descriptor: CallDescriptor::new(ret, &args)?,
        })
    }

    fn identifier(&mut self) -> Result<&'s str, SignatureError> {
        let start = self.position();
        match self.chars.peek() {
            Some(&(_, c)) if is_ident_start(c) => {
                self.chars.next();
            }
            _ => return Err(SignatureError::InvalidIdentifier { position: start }),
        }
        while self.chars.next_if(|&(_, c)| is_ident_part(c)).is_some() {}
        let end = self.position();
        Ok(&self.input[start..end])
    }
}
