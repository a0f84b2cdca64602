//! Block linearization and clump extraction.
//!
//! A method body in linear-block form is a chain of frames: each frame's
//! final statement may be a nested block, which becomes the next frame.
//! [`LinearBlocks`] borrows that chain without copying it. The final
//! statement of every frame except the last is a *pointer* to the next frame
//! and is never itself addressed by a [`Position`]; positions always name
//! *content* statements.
//!
//! Nothing here mutates the body. Clumps are returned as borrowed statement
//! lists and residual bodies are fresh [`Block`]s.

use std::fmt;

use contractor_core::{Block, MethodId, Stmt};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{report, ExtractionDiagnostic};
use crate::error::ExtractError;

/// A content statement address: frame index, then statement index within
/// the frame. Ordered lexicographically, which is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub block: usize,
    pub stmt: usize,
}

impl Position {
    pub const START: Position = Position { block: 0, stmt: 0 };

    pub fn new(block: usize, stmt: usize) -> Self {
        Position { block, stmt }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.stmt)
    }
}

/// The linearized frames of one method body.
#[derive(Debug, Clone)]
pub struct LinearBlocks<'a> {
    frames: Vec<&'a Block>,
}

impl<'a> LinearBlocks<'a> {
    /// Follows trailing nested blocks from `root` until a frame's last
    /// statement is not a block.
    pub fn new(root: &'a Block) -> Self {
        let mut frames = vec![root];
        let mut current = root;
        while let Some(next) = current.trailing_block() {
            frames.push(next);
            current = next;
        }
        LinearBlocks { frames }
    }

    pub fn frames(&self) -> &[&'a Block] {
        &self.frames
    }

    /// Number of frames (nesting depth + 1).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(|f| f.is_empty())
    }

    /// Content statements of frame `block` (the pointer excluded).
    pub fn content(&self, block: usize) -> &'a [Stmt] {
        let Some(frame) = self.frames.get(block) else {
            return &[];
        };
        if block + 1 < self.frames.len() {
            &frame.stmts[..frame.stmts.len() - 1]
        } else {
            &frame.stmts
        }
    }

    /// The content statement at `pos`.
    pub fn stmt(&self, pos: Position) -> Option<&'a Stmt> {
        self.content(pos.block).get(pos.stmt)
    }

    /// `pos` if it names a content statement, else the first content
    /// statement after it. `None` past the end.
    pub fn normalize(&self, pos: Position) -> Option<Position> {
        let mut block = pos.block;
        let mut stmt = pos.stmt;
        while block < self.frames.len() {
            if stmt < self.content(block).len() {
                return Some(Position { block, stmt });
            }
            block += 1;
            stmt = 0;
        }
        None
    }

    /// The content position following `pos`.
    pub fn next(&self, pos: Position) -> Option<Position> {
        self.normalize(Position::new(pos.block, pos.stmt + 1))
    }

    /// Content statements at and after `start`, in document order.
    pub fn iter_from(&self, start: Position) -> impl Iterator<Item = (Position, &'a Stmt)> + '_ {
        std::iter::successors(self.normalize(start), move |p| self.next(*p))
            .filter_map(move |p| self.stmt(p).map(|s| (p, s)))
    }

    /// All content statements from `start` through `end` inclusive,
    /// stitched across frame boundaries.
    pub fn clump(&self, start: Position, end: Position) -> Result<Vec<&'a Stmt>, ExtractError> {
        if start > end {
            return Err(ExtractError::InvalidClumpRange { start, end });
        }
        for position in [start, end] {
            if self.stmt(position).is_none() {
                return Err(ExtractError::PositionOutOfRange { position });
            }
        }

        let mut out = Vec::new();
        for block in start.block..=end.block {
            let content = self.content(block);
            let from = if block == start.block { start.stmt } else { 0 };
            let to = if block == end.block {
                end.stmt + 1
            } else {
                content.len()
            };
            out.extend(&content[from..to]);
        }
        Ok(out)
    }

    /// The body that remains when everything before `pos` is removed.
    ///
    /// Nesting below `pos`'s frame is kept intact. `None` yields an empty
    /// body.
    pub fn residual_from(&self, pos: Option<Position>) -> Block {
        match pos.and_then(|p| self.normalize(p)) {
            Some(p) => Block::new(self.frames[p.block].stmts[p.stmt..].to_vec()),
            None => Block::default(),
        }
    }

    /// Reports nested blocks that are not the final statement of their frame.
    ///
    /// Such blocks break the linear form; the statements inside them are not
    /// scanned.
    pub fn validate(&self, method: MethodId, sink: &mut Vec<ExtractionDiagnostic>) {
        for (frame, block) in self.frames.iter().enumerate() {
            let last = block.stmts.len().saturating_sub(1);
            for (index, stmt) in block.stmts.iter().enumerate() {
                if index != last && stmt.as_block().is_some() {
                    report(
                        sink,
                        ExtractionDiagnostic::MisplacedNestedBlock {
                            method,
                            frame,
                            index,
                        },
                    );
                }
            }
        }
    }
}
