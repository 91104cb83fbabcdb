use std::{borrow::Cow, error::Error, fmt, fs, io, path::Path, str, string::FromUtf8Error};

use crate::Span;

#[derive(Debug)]
pub enum InputError {
    Io(io::Error),
    Utf8(str::Utf8Error),
}

impl Error for InputError {}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputError::Io(e) => write!(f, "Can't read input: {}", e),
            InputError::Utf8(e) => write!(f, "Input is not valid UTF-8: {}", e),
        }
    }
}

impl From<io::Error> for InputError {
    fn from(err: io::Error) -> Self {
        InputError::Io(err)
    }
}

impl From<str::Utf8Error> for InputError {
    fn from(err: str::Utf8Error) -> Self {
        InputError::Utf8(err)
    }
}

impl From<FromUtf8Error> for InputError {
    fn from(err: FromUtf8Error) -> Self {
        InputError::Utf8(err.utf8_error())
    }
}

/// The text a lexer scans. The text is either shared with the caller (who must keep it alive for
/// `'input`) or owned by the buffer, in which case it can be handed back to the caller with
/// [`Lexer::release_buffer`](crate::Lexer::release_buffer) so that tokens and trees, which only
/// store [`Span`]s, can still be rendered once the lexer has gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputBuffer<'input> {
    text: Cow<'input, str>,
}

impl<'input> InputBuffer<'input> {
    pub fn shared(s: &'input str) -> Self {
        InputBuffer {
            text: Cow::Borrowed(s),
        }
    }

    pub fn owned(s: String) -> Self {
        InputBuffer {
            text: Cow::Owned(s),
        }
    }

    /// Share `b`, which must be valid UTF-8.
    pub fn shared_bytes(b: &'input [u8]) -> Result<Self, InputError> {
        Ok(InputBuffer::shared(str::from_utf8(b)?))
    }

    /// Take ownership of `b`, which must be valid UTF-8.
    pub fn owned_bytes(b: Vec<u8>) -> Result<Self, InputError> {
        Ok(InputBuffer::owned(String::from_utf8(b)?))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        InputBuffer::owned_bytes(fs::read(path)?)
    }

    /// Is the text borrowed from the caller (rather than owned by this buffer)?
    pub fn is_shared(&self) -> bool {
        matches!(self.text, Cow::Borrowed(_))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The text covered by `span`.
    ///
    /// # Panics
    ///
    /// If `span` does not lie within this buffer on UTF-8 boundaries.
    pub fn span_str(&self, span: Span) -> &str {
        &self.text[span.start()..span.end()]
    }

    /// Take ownership of the text, copying it if it is shared.
    pub fn into_owned(self) -> InputBuffer<'static> {
        InputBuffer::owned(self.text.into_owned())
    }
}
