//! Recursive-descent parser turning a token stream into an AST.
//!
//! The trickiest part of the grammar is telling a part declaration
//! (`piano/organ "keys":`) apart from a variable reference or definition
//! (`theme` / `theme = c d e`): both start with a bare name. The parser
//! resolves this with bounded lookahead — scan ahead without consuming
//! until `:`, `=`, or an event-starting token disambiguates, then rewind.

use crate::ast::{Duration, DurationComponent, LispForm, Node, NodeKind, OnReps, Root, Voice};
use crate::error::{AldaError, Result};
use crate::scanner;
use crate::token::{Token, TokenKind};
use log::debug;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.position.min(self.tokens.len() - 1)].clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        tok
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn error(&self, message: impl Into<String>) -> AldaError {
        let pos = &self.current().position;
        AldaError::syntax(pos.line, pos.column, message)
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> Result<Token> {
        if std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {context}, found {:?}",
                self.current().kind
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.current().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    /// Bounded lookahead: does the token stream starting here match
    /// `NAME ("/" NAME)* ALIAS? ":"` without consuming anything?
    fn looks_like_part_decl(&self) -> bool {
        let mut i = self.position;
        let get = |i: usize| -> &TokenKind { &self.tokens[i.min(self.tokens.len() - 1)].kind };
        if !matches!(get(i), TokenKind::Name(_)) {
            return false;
        }
        i += 1;
        loop {
            if matches!(get(i), TokenKind::Slash) {
                i += 1;
                if !matches!(get(i), TokenKind::Name(_)) {
                    return false;
                }
                i += 1;
            } else {
                break;
            }
        }
        if matches!(get(i), TokenKind::Alias(_)) {
            i += 1;
        }
        matches!(get(i), TokenKind::Colon)
    }

    fn parse_part_decl(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let mut instruments = Vec::new();
        instruments.push(self.expect_name()?);
        while matches!(self.current().kind, TokenKind::Slash) {
            self.advance();
            instruments.push(self.expect_name()?);
        }
        let alias = if let TokenKind::Alias(name) = self.current().kind.clone() {
            self.advance();
            Some(name)
        } else {
            None
        };
        self.expect(&TokenKind::Colon, "':' after part declaration")?;
        debug!("parsed part declaration: {instruments:?} alias={alias:?}");
        Ok(Node::new(
            NodeKind::PartDecl { instruments, alias },
            start,
        ))
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.current().kind.clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a name, found {other:?}"))),
        }
    }

    pub fn parse_root(&mut self) -> Result<Root> {
        let mut children = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            let start = self.current().position.clone();
            if self.looks_like_part_decl() {
                children.push(self.parse_part_decl()?);
                let events = self.parse_event_seq()?;
                children.push(Node::new(NodeKind::EventSeq(events), start));
            } else {
                let events = self.parse_event_seq()?;
                children.push(Node::new(NodeKind::EventSeq(events), start));
            }
            self.skip_newlines();
        }
        Ok(Root { children })
    }

    /// Parses events until EOF, a closing delimiter, or the start of a new
    /// part declaration.
    fn parse_event_seq(&mut self) -> Result<Vec<Node>> {
        self.parse_event_seq_inner(false)
    }

    /// Parses events for the body of a single voice within a voice group.
    /// Stops before the next `V<n>:` marker so the enclosing voice-group
    /// loop can dispatch it, rather than recursing into a nested group.
    fn parse_voice_body(&mut self) -> Result<Vec<Node>> {
        self.parse_event_seq_inner(true)
    }

    fn parse_event_seq_inner(&mut self, stop_at_voice_marker: bool) -> Result<Vec<Node>> {
        let mut events = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_eof() || self.looks_like_part_decl() || self.at_closing_delimiter() {
                break;
            }
            if stop_at_voice_marker && matches!(self.current().kind, TokenKind::Voice(_)) {
                break;
            }
            events.push(self.parse_event()?);
        }
        Ok(events)
    }

    fn at_closing_delimiter(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::RCram | TokenKind::RBracket | TokenKind::RParen
        )
    }

    fn parse_event(&mut self) -> Result<Node> {
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, primary: Node) -> Result<Node> {
        let mut node = primary;
        if let TokenKind::Repeat(count) = self.current().kind {
            let pos = node.position.clone();
            self.advance();
            node = Node::new(
                NodeKind::Repeat {
                    inner: Box::new(node),
                    count,
                },
                pos,
            );
        }
        if let TokenKind::Repetitions(spec) = self.current().kind.clone() {
            let pos = node.position.clone();
            let on_reps = OnReps::parse(&spec)
                .ok_or_else(|| self.error(format!("malformed repetition specifier '{spec}'")))?;
            self.advance();
            node = Node::new(
                NodeKind::OnReps {
                    inner: Box::new(node),
                    on_reps,
                },
                pos,
            );
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        match self.current().kind.clone() {
            TokenKind::NoteLetter(_) => self.parse_note_or_chord(),
            TokenKind::Rest => {
                self.advance();
                let duration = self.try_parse_duration()?;
                Ok(Node::new(NodeKind::Rest { duration }, start))
            }
            TokenKind::OctaveSet(n) => {
                self.advance();
                Ok(Node::new(NodeKind::OctaveSet(n), start))
            }
            TokenKind::OctaveUp => {
                self.advance();
                Ok(Node::new(NodeKind::OctaveUp, start))
            }
            TokenKind::OctaveDown => {
                self.advance();
                Ok(Node::new(NodeKind::OctaveDown, start))
            }
            TokenKind::Barline => {
                self.advance();
                Ok(Node::new(NodeKind::Barline, start))
            }
            TokenKind::LParen => self.parse_sexp(),
            TokenKind::LCram => self.parse_cram(),
            TokenKind::LBracket => self.parse_bracket_seq(),
            TokenKind::Marker(name) => {
                self.advance();
                Ok(Node::new(NodeKind::Marker { name }, start))
            }
            TokenKind::AtMarker(name) => {
                self.advance();
                Ok(Node::new(NodeKind::AtMarker { name }, start))
            }
            TokenKind::Voice(_) => self.parse_voice_group(),
            TokenKind::Name(_) => self.parse_var_ref_or_def(),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_note_or_chord(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let first = self.parse_note()?;
        let mut members = vec![first];
        while matches!(self.current().kind, TokenKind::Slash) {
            self.advance();
            let member = if matches!(self.current().kind, TokenKind::Rest) {
                let rstart = self.current().position.clone();
                self.advance();
                let duration = self.try_parse_duration()?;
                Node::new(NodeKind::Rest { duration }, rstart)
            } else {
                self.parse_note()?
            };
            members.push(member);
        }
        if members.len() == 1 {
            Ok(members.pop().unwrap())
        } else {
            Ok(Node::new(NodeKind::Chord(members), start))
        }
    }

    fn parse_note(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let letter = match self.current().kind {
            TokenKind::NoteLetter(c) => c,
            ref other => return Err(self.error(format!("expected a note letter, found {other:?}"))),
        };
        self.advance();
        let mut accidentals = String::new();
        loop {
            match self.current().kind {
                TokenKind::Sharp => {
                    accidentals.push('+');
                    self.advance();
                }
                TokenKind::Flat => {
                    accidentals.push('-');
                    self.advance();
                }
                TokenKind::Natural => {
                    accidentals.push('_');
                    self.advance();
                }
                _ => break,
            }
        }
        let duration = self.try_parse_duration()?;
        let slurred = if matches!(self.current().kind, TokenKind::Tie) {
            self.advance();
            true
        } else {
            false
        };
        Ok(Node::new(
            NodeKind::Note {
                letter,
                accidentals,
                duration,
                slurred,
            },
            start,
        ))
    }

    /// `duration := dur_component ("~" dur_component)*`. Returns `None`
    /// when no length token is present (the part's default length applies).
    fn try_parse_duration(&mut self) -> Result<Option<Duration>> {
        let Some(mut component) = self.try_parse_duration_component()? else {
            return Ok(None);
        };
        let mut duration = Duration::single(component);
        while matches!(self.current().kind, TokenKind::Tie)
            && matches!(self.peek_kind_at(1), TokenKind::Number(_))
        {
            self.advance(); // consume '~'
            component = self
                .try_parse_duration_component()?
                .expect("peeked a Number");
            duration.components.push(component);
        }
        Ok(Some(duration))
    }

    fn try_parse_duration_component(&mut self) -> Result<Option<DurationComponent>> {
        match self.current().kind.clone() {
            TokenKind::Number(denominator) => {
                self.advance();
                let mut dots = 0;
                while matches!(self.current().kind, TokenKind::Dot) {
                    dots += 1;
                    self.advance();
                }
                Ok(Some(DurationComponent::NoteLength { denominator, dots }))
            }
            TokenKind::NumberMs(ms) => {
                self.advance();
                Ok(Some(DurationComponent::Milliseconds(ms)))
            }
            TokenKind::NumberS(s) => {
                self.advance();
                Ok(Some(DurationComponent::Seconds(s)))
            }
            _ => Ok(None),
        }
    }

    fn parse_cram(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        self.advance(); // '{'
        let events = self.parse_event_seq()?;
        self.expect(&TokenKind::RCram, "'}' to close a cram")?;
        let duration = self.try_parse_duration()?;
        Ok(Node::new(NodeKind::Cram { events, duration }, start))
    }

    fn parse_bracket_seq(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        self.advance(); // '['
        let events = self.parse_event_seq()?;
        self.expect(&TokenKind::RBracket, "']' to close a bracketed sequence")?;
        Ok(Node::new(NodeKind::BracketSeq { events }, start))
    }

    fn parse_voice_group(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let mut voices = Vec::new();
        loop {
            let number = match self.current().kind {
                TokenKind::Voice(n) => n,
                _ => break,
            };
            self.advance();
            if number == 0 {
                // V0: marks the rejoin point; it carries no events of its own.
                break;
            }
            let events = self.parse_voice_body()?;
            voices.push(Voice { number, events });
            self.skip_newlines();
        }
        if voices.is_empty() {
            return Err(self.error("expected at least one voice in a voice group"));
        }
        Ok(Node::new(NodeKind::VoiceGroup(voices), start))
    }

    fn parse_var_ref_or_def(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let name = self.expect_name()?;
        if matches!(self.current().kind, TokenKind::Equals) {
            self.advance();
            let events = self.parse_event_seq_until_newline()?;
            Ok(Node::new(NodeKind::VarDef { name, events }, start))
        } else {
            Ok(Node::new(NodeKind::VarRef { name }, start))
        }
    }

    fn parse_event_seq_until_newline(&mut self) -> Result<Vec<Node>> {
        let mut events = Vec::new();
        loop {
            if self.at_eof() || matches!(self.current().kind, TokenKind::Newline) {
                break;
            }
            events.push(self.parse_event()?);
        }
        Ok(events)
    }

    fn parse_sexp(&mut self) -> Result<Node> {
        let start = self.current().position.clone();
        let form = self.parse_sexp_list()?;
        Ok(Node::new(NodeKind::Lisp(form), start))
    }

    fn parse_sexp_list(&mut self) -> Result<LispForm> {
        self.expect(&TokenKind::LParen, "'(' to start an S-expression")?;
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            match self.current().kind.clone() {
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::LParen => items.push(self.parse_sexp_list()?),
                TokenKind::Symbol(s) => {
                    self.advance();
                    items.push(LispForm::Symbol(s));
                }
                TokenKind::LispNumber(n) => {
                    self.advance();
                    items.push(LispForm::Number(n));
                }
                TokenKind::LispString(s) => {
                    self.advance();
                    items.push(LispForm::Str(s));
                }
                other => return Err(self.error(format!("unexpected token in S-expression: {other:?}"))),
            }
        }
        Ok(LispForm::List(items))
    }
}

/// Scans and parses `source` into a [`Root`] AST.
pub fn parse(source: &str, filename: Option<&str>) -> Result<Root> {
    let tokens = scanner::scan(source, filename)?;
    Parser::new(tokens).parse_root()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Root {
        parse(source, None).expect("expected source to parse")
    }

    #[test]
    fn test_simple_part_and_notes() {
        let root = parse_ok("piano: c d e");
        assert_eq!(root.children.len(), 2);
        assert!(matches!(root.children[0].kind, NodeKind::PartDecl { .. }));
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => assert_eq!(events.len(), 3),
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_part_decl_with_alias_and_join() {
        let root = parse_ok("piano/organ \"keys\": c");
        match &root.children[0].kind {
            NodeKind::PartDecl { instruments, alias } => {
                assert_eq!(instruments, &vec!["piano".to_string(), "organ".to_string()]);
                assert_eq!(alias.as_deref(), Some("keys"));
            }
            other => panic!("expected PartDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_chord() {
        let root = parse_ok("piano: c/e/g");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::Chord(members) => assert_eq!(members.len(), 3),
                other => panic!("expected Chord, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_tied_duration() {
        let root = parse_ok("piano: c1~1");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::Note { duration: Some(d), .. } => assert_eq!(d.components.len(), 2),
                other => panic!("expected Note, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_slur_without_explicit_duration() {
        let root = parse_ok("piano: c~ d");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => {
                assert_eq!(events.len(), 2);
                match &events[0].kind {
                    NodeKind::Note { duration: None, slurred: true, .. } => {}
                    other => panic!("expected a slurred default-length note, got {other:?}"),
                }
            }
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_variable_def_and_ref() {
        let root = parse_ok("theme = c d e\npiano: theme theme");
        match &root.children[0].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::VarDef { name, events } => {
                    assert_eq!(name, "theme");
                    assert_eq!(events.len(), 3);
                }
                other => panic!("expected VarDef, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
        match &root.children[2].kind {
            NodeKind::EventSeq(events) => {
                assert_eq!(events.len(), 2);
                assert!(matches!(events[0].kind, NodeKind::VarRef { .. }));
            }
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_marker_and_at_marker() {
        let root = parse_ok("piano: c %here d\nviolin: @here e");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => {
                assert!(matches!(events[1].kind, NodeKind::Marker { .. }));
            }
            other => panic!("expected EventSeq, got {other:?}"),
        }
        match &root.children[3].kind {
            NodeKind::EventSeq(events) => {
                assert!(matches!(events[0].kind, NodeKind::AtMarker { .. }));
            }
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_bracket_repeat_with_on_reps() {
        let root = parse_ok("piano: [c d e]*3'1-2");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::OnReps { inner, on_reps } => {
                    assert!(on_reps.contains(1) && on_reps.contains(2) && !on_reps.contains(3));
                    assert!(matches!(inner.kind, NodeKind::Repeat { .. }));
                }
                other => panic!("expected OnReps, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_cram() {
        let root = parse_ok("piano: {c d e}4");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::Cram { events, duration } => {
                    assert_eq!(events.len(), 3);
                    assert!(duration.is_some());
                }
                other => panic!("expected Cram, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_voice_group() {
        let root = parse_ok("piano: V1: c d V2: e f V0:");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::VoiceGroup(voices) => {
                    assert_eq!(voices.len(), 2);
                    assert_eq!(voices[0].number, 1);
                    assert_eq!(voices[1].number, 2);
                }
                other => panic!("expected VoiceGroup, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_sexp_attribute() {
        let root = parse_ok("piano: (tempo 60) c");
        match &root.children[1].kind {
            NodeKind::EventSeq(events) => match &events[0].kind {
                NodeKind::Lisp(LispForm::List(items)) => {
                    assert_eq!(items.len(), 2);
                    assert!(matches!(items[0], LispForm::Symbol(ref s) if s == "tempo"));
                }
                other => panic!("expected Lisp, got {other:?}"),
            },
            other => panic!("expected EventSeq, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_bracket_is_error() {
        let err = parse("piano: [c d", None).unwrap_err();
        assert!(matches!(err, AldaError::SyntaxError { .. }));
    }

    #[test]
    fn test_multiple_parts() {
        let root = parse_ok("piano: c\nviolin: d");
        assert_eq!(root.children.len(), 4);
        assert!(matches!(root.children[0].kind, NodeKind::PartDecl { .. }));
        assert!(matches!(root.children[2].kind, NodeKind::PartDecl { .. }));
    }
}
