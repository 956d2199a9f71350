//! Game records in the parenthesized move-list notation.
//!
//! ```text
//! (;FF[4]SZ[5];W[c3];B[d4](;W[a1]C[visits:120 outcome:p1](;B[b2]))(;W[e5]))
//! ```
//!
//! The nodes of the first sequence after the header are the game so far.
//! Variations hold a search tree below that position; per-node statistics
//! ride in the comment as `key:value` words (`visits`, `outcome`, `phi`,
//! `delta`). `W` is the first player, `B` the second.

use std::fmt::Write as _;

use crate::board::{Board, BoardOptions};
use crate::error::{RecordError, RecordResult};
use crate::types::{Move, Outcome, Player};

/// One node of an exported search tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNode {
    pub mv: Move,
    pub mover: Player,
    pub visits: u64,
    pub outcome: Outcome,
    /// proof and disproof numbers, solver trees only
    pub proof: Option<(u32, u32)>,
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    pub fn new(mv: Move, mover: Player) -> Self {
        RecordNode { mv, mover, visits: 0, outcome: Outcome::Unknown, proof: None, children: Vec::new() }
    }

    /// Nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RecordNode::count).sum::<usize>()
    }

    fn comment(&self) -> String {
        let mut c = format!("visits:{} outcome:{}", self.visits, self.outcome);
        if let Some((phi, delta)) = self.proof {
            let _ = write!(c, " phi:{phi} delta:{delta}");
        }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub size: usize,
    pub moves: Vec<Move>,
    pub tree: Vec<RecordNode>,
}

impl GameRecord {
    pub fn new(size: usize) -> Self {
        GameRecord { size, moves: Vec::new(), tree: Vec::new() }
    }

    /// Position after the recorded moves.
    pub fn replay(&self, opts: BoardOptions) -> RecordResult<Board> {
        if opts.size != self.size {
            return Err(RecordError::SizeMismatch { expected: opts.size, found: self.size });
        }
        Ok(Board::from_moves(opts, &self.moves)?)
    }
}

fn escape(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == ']' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

fn colour(p: Player) -> &'static str {
    match p {
        Player::One => "W",
        Player::Two => "B",
    }
}

fn write_node(out: &mut String, node: &RecordNode) {
    out.push_str("(;");
    out.push_str(colour(node.mover));
    out.push('[');
    escape(out, &node.mv.to_string());
    out.push_str("]C[");
    escape(out, &node.comment());
    out.push(']');
    for child in &node.children {
        write_node(out, child);
    }
    out.push(')');
}

pub fn write_sgf(record: &GameRecord) -> String {
    let mut out = format!("(;FF[4]SZ[{}]", record.size);
    let mut mover = Player::One;
    for mv in &record.moves {
        let _ = write!(out, ";{}[{mv}]", colour(mover));
        mover = mover.opponent();
    }
    for node in &record.tree {
        write_node(&mut out, node);
    }
    out.push(')');
    out
}

// ---------------------------------------------------------------------------
// parsing

#[derive(Debug, Default)]
struct SgfNode {
    props: Vec<(String, String)>,
    pos: usize,
}

impl SgfNode {
    fn get(&self, key: &str) -> Option<&str> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct SgfTree {
    seq: Vec<SgfNode>,
    vars: Vec<SgfTree>,
}

struct Parser<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error<T>(&self, reason: impl Into<String>) -> RecordResult<T> {
        Err(RecordError::Syntax { pos: self.pos, reason: reason.into() })
    }

    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.text.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> RecordResult<()> {
        match self.peek() {
            Some(b) if b == c => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => self.error(format!("expected '{}', found '{}'", c as char, b as char)),
            None => self.error(format!("expected '{}', found end of input", c as char)),
        }
    }

    fn tree(&mut self) -> RecordResult<SgfTree> {
        self.expect(b'(')?;
        let mut tree = SgfTree::default();
        while self.peek() == Some(b';') {
            tree.seq.push(self.node()?);
        }
        if tree.seq.is_empty() {
            return self.error("empty sequence");
        }
        while self.peek() == Some(b'(') {
            tree.vars.push(self.tree()?);
        }
        self.expect(b')')?;
        Ok(tree)
    }

    fn node(&mut self) -> RecordResult<SgfNode> {
        self.expect(b';')?;
        let mut node = SgfNode { props: Vec::new(), pos: self.pos };
        while let Some(c) = self.peek() {
            if !c.is_ascii_uppercase() {
                break;
            }
            let start = self.pos;
            while self.pos < self.text.len() && self.text[self.pos].is_ascii_uppercase() {
                self.pos += 1;
            }
            let key = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();
            if self.peek() != Some(b'[') {
                return self.error(format!("property {key} has no value"));
            }
            while self.peek() == Some(b'[') {
                let value = self.value()?;
                node.props.push((key.clone(), value));
            }
        }
        Ok(node)
    }

    fn value(&mut self) -> RecordResult<String> {
        self.expect(b'[')?;
        let mut bytes = Vec::new();
        loop {
            match self.text.get(self.pos) {
                None => return self.error("unterminated property value"),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.text.get(self.pos) {
                        Some(&c) => bytes.push(c),
                        None => return self.error("dangling escape"),
                    }
                    self.pos += 1;
                }
                Some(&c) => {
                    bytes.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn syntax<T>(pos: usize, reason: impl Into<String>) -> RecordResult<T> {
    Err(RecordError::Syntax { pos, reason: reason.into() })
}

/// The move and mover of a node, if it has one.
fn node_move(node: &SgfNode) -> RecordResult<Option<(Move, Player)>> {
    let (text, mover) = match (node.get("W"), node.get("B")) {
        (Some(_), Some(_)) => return syntax(node.pos, "node has both W and B"),
        (Some(t), None) => (t, Player::One),
        (None, Some(t)) => (t, Player::Two),
        (None, None) => return Ok(None),
    };
    Ok(Some((text.parse()?, mover)))
}

fn record_node(node: &SgfNode) -> RecordResult<RecordNode> {
    let Some((mv, mover)) = node_move(node)? else {
        return syntax(node.pos, "variation node without a move");
    };
    let mut out = RecordNode::new(mv, mover);
    let (mut phi, mut delta) = (None, None);
    for word in node.get("C").unwrap_or("").split_whitespace() {
        let Some((key, value)) = word.split_once(':') else { continue };
        let bad = || RecordError::Syntax { pos: node.pos, reason: format!("bad comment field '{word}'") };
        match key {
            "visits" => out.visits = value.parse().map_err(|_| bad())?,
            "outcome" => out.outcome = value.parse()?,
            "phi" => phi = Some(value.parse().map_err(|_| bad())?),
            "delta" => delta = Some(value.parse().map_err(|_| bad())?),
            _ => {}
        }
    }
    out.proof = phi.zip(delta);
    Ok(out)
}

/// A variation: its sequence chains parent to child, its own variations hang
/// off the last node.
fn variation(tree: &SgfTree) -> RecordResult<RecordNode> {
    let mut children = tree.vars.iter().map(variation).collect::<RecordResult<Vec<_>>>()?;
    let mut node = None;
    for sgf in tree.seq.iter().rev() {
        let mut n = record_node(sgf)?;
        n.children = match node.take() {
            Some(child) => vec![child],
            None => std::mem::take(&mut children),
        };
        node = Some(n);
    }
    node.map_or_else(|| syntax(0, "empty variation"), Ok)
}

pub fn parse_sgf(text: &str) -> RecordResult<GameRecord> {
    let mut parser = Parser { text: text.as_bytes(), pos: 0 };
    let root = parser.tree()?;
    if parser.peek().is_some() {
        return parser.error("trailing data after game tree");
    }

    let header = &root.seq[0];
    let size = match header.get("SZ") {
        Some(sz) => sz.trim().parse::<usize>().map_err(|_| RecordError::Syntax {
            pos: header.pos,
            reason: format!("bad size '{sz}'"),
        })?,
        None => return syntax(header.pos, "missing SZ"),
    };
    if !(crate::board::MIN_SIZE..=crate::board::MAX_SIZE).contains(&size) {
        return Err(crate::error::ParseError::InvalidSize(size).into());
    }

    let mut record = GameRecord::new(size);
    for node in &root.seq[1..] {
        if let Some((mv, _)) = node_move(node)? {
            record.moves.push(mv);
        }
    }
    record.tree = root.vars.iter().map(variation).collect::<RecordResult<_>>()?;
    Ok(record)
}
