//! Token lexer for the text format.
//!
//! The text format is a bracketed token stream. `[` and `]` are always tokens
//! of their own, `"..."` is a quoted string and anything else separated by
//! whitespace is a bareword, matched case-insensitively against [`Keyword`].
//! A bareword directly followed by `]` (as in `1.0]`) is returned alone and the
//! bracket is pushed back as a synthesized token, so the next call yields it.

use std::fmt;

use crate::stream::Stream;
use crate::util::{Error, Result};

/// Longest bareword accepted.
pub const MAX_TOKEN_LEN: usize = 1024;

/// Longest quoted string accepted.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Reserved words of the text format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Object,
    Polygon,
    Polyline,
    PointList,
    Number,
    Point,
    Vector,
    Plane,
    CtlPt,
    Matrix,
    Instance,
    String,
    Curve,
    Surface,
    TrimSrf,
    TrimCrv,
    TrimCrvSeg,
    Trivar,
    TriSrf,
    Model,
    MdlTSrf,
    MdlTSeg,
    MdlLoop,
    Multivar,
    Bezier,
    Bspline,
    Power,
    Kv,
    Kvp,
    Normal,
    Internal,
    None,
    Color,
    Rgb,
    Invisible,
    Animation,
    /// `E1`..`E9`, `P1`..`P9`.
    PtType,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("OBJECT", Keyword::Object),
    ("POLYGON", Keyword::Polygon),
    ("POLYLINE", Keyword::Polyline),
    ("POINTLIST", Keyword::PointList),
    ("NUMBER", Keyword::Number),
    ("POINT", Keyword::Point),
    ("VECTOR", Keyword::Vector),
    ("PLANE", Keyword::Plane),
    ("CTLPT", Keyword::CtlPt),
    ("MATRIX", Keyword::Matrix),
    ("INSTANCE", Keyword::Instance),
    ("STRING", Keyword::String),
    ("CURVE", Keyword::Curve),
    ("SURFACE", Keyword::Surface),
    ("TRIMSRF", Keyword::TrimSrf),
    ("TRIMCRV", Keyword::TrimCrv),
    ("TRIMCRVSEG", Keyword::TrimCrvSeg),
    ("TRIVAR", Keyword::Trivar),
    ("TRISRF", Keyword::TriSrf),
    ("MODEL", Keyword::Model),
    ("MDLTSRF", Keyword::MdlTSrf),
    ("MDLTSEG", Keyword::MdlTSeg),
    ("MDLLOOP", Keyword::MdlLoop),
    ("MULTIVAR", Keyword::Multivar),
    ("BEZIER", Keyword::Bezier),
    ("BSPLINE", Keyword::Bspline),
    ("POWER", Keyword::Power),
    ("KV", Keyword::Kv),
    ("KVP", Keyword::Kvp),
    ("NORMAL", Keyword::Normal),
    ("INTERNAL", Keyword::Internal),
    ("NONE", Keyword::None),
    ("COLOR", Keyword::Color),
    ("RGB", Keyword::Rgb),
    ("INVISIBLE", Keyword::Invisible),
    ("ANIMATION", Keyword::Animation),
];

impl Keyword {
    /// Case-insensitive keyword lookup.
    pub fn lookup(text: &str) -> Option<Self> {
        let b = text.as_bytes();
        if b.len() == 2 && matches!(b[0], b'E' | b'e' | b'P' | b'p') && (b'1'..=b'9').contains(&b[1]) {
            return Some(Self::PtType);
        }
        KEYWORDS
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(text))
            .map(|(_, k)| *k)
    }

    /// Keywords that open an object body rather than an attribute.
    pub fn is_form(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Object
                | Polygon
                | Polyline
                | PointList
                | Number
                | Point
                | Vector
                | Plane
                | CtlPt
                | Matrix
                | Instance
                | String
                | Curve
                | Surface
                | TrimSrf
                | Trivar
                | TriSrf
                | Model
                | Multivar
        )
    }
}

/// Token classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    OpenBracket,
    CloseBracket,
    Quoted,
    Keyword(Keyword),
    Other,
    Eof,
}

/// A token and its source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }

    pub fn open() -> Self {
        Self::new(TokenKind::OpenBracket, "[")
    }

    pub fn close() -> Self {
        Self::new(TokenKind::CloseBracket, "]")
    }

    pub fn eof() -> Self {
        Self::new(TokenKind::Eof, "")
    }

    /// Bareword classified against the keyword table.
    pub fn word(text: String) -> Self {
        let kind = Keyword::lookup(&text).map_or(TokenKind::Other, TokenKind::Keyword);
        Self { kind, text }
    }

    #[inline]
    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        }
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Bareword or quoted string, usable as a name.
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::Other | TokenKind::Quoted | TokenKind::Keyword(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of file"),
            TokenKind::Quoted => write!(f, "\"{}\"", self.text),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

fn is_control(b: u8) -> bool {
    b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t')
}

/// Next token from a text stream, honoring pushed back tokens first.
pub fn next_token(stream: &mut Stream) -> Result<Token> {
    if let Some(tok) = stream.pop_token() {
        return Ok(tok);
    }

    let first = loop {
        let Some(b) = stream.get_byte()? else {
            return Ok(Token::eof());
        };
        match b {
            b'\n' => stream.next_line(),
            b' ' | b'\t' | b'\r' => {}
            b'#' => skip_comment(stream)?,
            b if is_control(b) => return Err(Error::BinaryAsText { line: stream.line() }),
            b => break b,
        }
    };

    match first {
        b'[' => Ok(Token::open()),
        b']' => Ok(Token::close()),
        b'"' => read_quoted(stream),
        b => read_word(stream, b),
    }
}

/// Push a token back onto the stream.
pub fn unget_token(stream: &mut Stream, token: Token) -> Result<()> {
    stream.push_token(token)
}

fn skip_comment(stream: &mut Stream) -> Result<()> {
    while let Some(b) = stream.get_byte()? {
        if b == b'\n' {
            stream.next_line();
            break;
        }
    }
    Ok(())
}

fn read_quoted(stream: &mut Stream) -> Result<Token> {
    let start = stream.line();
    let mut buf = Vec::new();
    loop {
        let b = stream
            .get_byte()?
            .ok_or_else(|| Error::lexical(start, "unterminated string"))?;
        match b {
            b'"' => break,
            b'\\' => {
                let esc = stream
                    .get_byte()?
                    .ok_or_else(|| Error::lexical(start, "unterminated string"))?;
                if esc == b'\n' {
                    stream.next_line();
                }
                buf.push(esc);
            }
            b'\n' => {
                stream.next_line();
                buf.push(b);
            }
            b if is_control(b) => return Err(Error::BinaryAsText { line: stream.line() }),
            b => buf.push(b),
        }
        if buf.len() > MAX_STRING_LEN {
            return Err(Error::lexical(start, format!("string longer than {MAX_STRING_LEN} bytes")));
        }
    }
    let text = String::from_utf8(buf).map_err(|_| Error::lexical(start, "string is not valid UTF-8"))?;
    Ok(Token::new(TokenKind::Quoted, text))
}

fn read_word(stream: &mut Stream, first: u8) -> Result<Token> {
    let mut buf = vec![first];
    while let Some(b) = stream.get_byte()? {
        match b {
            b']' => {
                stream.push_token(Token::close())?;
                break;
            }
            b'[' | b'"' | b'\n' => {
                stream.unget_byte(b);
                break;
            }
            b' ' | b'\t' | b'\r' => break,
            b if is_control(b) => return Err(Error::BinaryAsText { line: stream.line() }),
            b => buf.push(b),
        }
        if buf.len() > MAX_TOKEN_LEN {
            return Err(Error::lexical(stream.line(), format!("token longer than {MAX_TOKEN_LEN} bytes")));
        }
    }
    let text = String::from_utf8(buf).map_err(|_| Error::lexical(stream.line(), "token is not valid UTF-8"))?;
    Ok(Token::word(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{StreamFlags, StreamFormat, StreamManager, StreamMode, StreamSource};

    fn tokens(text: &str) -> Result<Vec<Token>> {
        let mut mgr = StreamManager::new();
        let h = mgr.open(
            StreamSource::Memory(text.as_bytes().to_vec()),
            StreamMode::Read,
            StreamFormat::Native,
            StreamFlags::text(),
        )?;
        let stream = mgr.reader(h)?;
        let mut out = Vec::new();
        loop {
            let tok = next_token(stream)?;
            if tok.is(TokenKind::Eof) {
                return Ok(out);
            }
            out.push(tok);
        }
    }

    #[test]
    fn test_brackets_split_from_words() {
        let toks = tokens("[POINT 1 2 3]").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenBracket,
                TokenKind::Keyword(Keyword::Point),
                TokenKind::Other,
                TokenKind::Other,
                TokenKind::Other,
                TokenKind::CloseBracket,
            ]
        );
        assert_eq!(toks[4].text, "3");
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let toks = tokens("curve BSpline e2 P9 E10 kvp").unwrap();
        assert_eq!(toks[0].keyword(), Some(Keyword::Curve));
        assert_eq!(toks[1].keyword(), Some(Keyword::Bspline));
        assert_eq!(toks[2].keyword(), Some(Keyword::PtType));
        assert_eq!(toks[3].keyword(), Some(Keyword::PtType));
        assert_eq!(toks[4].kind, TokenKind::Other);
        assert_eq!(toks[5].keyword(), Some(Keyword::Kvp));
        assert_eq!(toks[1].text, "BSpline");
    }

    #[test]
    fn test_quoted_strings() {
        let toks = tokens(r#"[NAME "a \"b\" [c]"] "OBJECT""#).unwrap();
        assert_eq!(toks[2], Token::new(TokenKind::Quoted, r#"a "b" [c]"#));
        assert_eq!(toks[3].kind, TokenKind::CloseBracket);
        assert_eq!(toks[4].kind, TokenKind::Quoted);

        let err = tokens("\"open").unwrap_err();
        assert!(matches!(err, Error::Lexical { line: 1, .. }));
    }

    #[test]
    fn test_comments_and_lines() {
        let mut mgr = StreamManager::new();
        let h = mgr
            .open(
                StreamSource::Memory(b"# header\n\n[x # tail\ny]".to_vec()),
                StreamMode::Read,
                StreamFormat::Native,
                StreamFlags::text(),
            )
            .unwrap();
        let s = mgr.reader(h).unwrap();
        assert_eq!(next_token(s).unwrap().kind, TokenKind::OpenBracket);
        assert_eq!(s.line(), 3);
        assert_eq!(next_token(s).unwrap().text, "x");
        assert_eq!(next_token(s).unwrap().text, "y");
        assert_eq!(s.line(), 4);
        assert_eq!(next_token(s).unwrap().kind, TokenKind::CloseBracket);
        assert_eq!(next_token(s).unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_binary_bytes_rejected() {
        let err = tokens("[OBJECT\n\x01\x02]").unwrap_err();
        assert!(matches!(err, Error::BinaryAsText { line: 2 }));
    }

    #[test]
    fn test_unget_returns_same_token() {
        let mut mgr = StreamManager::new();
        let h = mgr
            .open(
                StreamSource::Memory(b"[a] \"q\" KV".to_vec()),
                StreamMode::Read,
                StreamFormat::Native,
                StreamFlags::text(),
            )
            .unwrap();
        let s = mgr.reader(h).unwrap();
        let mut seen = Vec::new();
        loop {
            let tok = next_token(s).unwrap();
            if tok.is(TokenKind::Eof) {
                break;
            }
            // the synthesized bracket from `a]` must survive a pushback too
            unget_token(s, tok.clone()).unwrap();
            assert_eq!(next_token(s).unwrap(), tok);
            seen.push(tok.kind);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[2], TokenKind::CloseBracket);
        assert_eq!(seen[4], TokenKind::Keyword(Keyword::Kv));
    }

    #[test]
    fn test_pushback_overflow() {
        let mut mgr = StreamManager::new();
        let h = mgr
            .open(StreamSource::Memory(Vec::new()), StreamMode::Read, StreamFormat::Native, StreamFlags::text())
            .unwrap();
        let s = mgr.reader(h).unwrap();
        for _ in 0..crate::stream::TOKEN_STACK_DEPTH {
            unget_token(s, Token::open()).unwrap();
        }
        assert!(matches!(unget_token(s, Token::open()), Err(Error::Lexical { .. })));
    }
}
