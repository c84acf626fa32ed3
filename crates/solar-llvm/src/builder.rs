// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! A minimal textual IR function builder: named blocks, fresh temporaries,
//! and one-terminator-per-block bookkeeping.

/// A basic block under construction.
struct Block {
    label: String,
    lines: Vec<String>,
    terminated: bool,
}

/// Builds the textual body of one IR function.
pub(crate) struct FunctionBuilder {
    /// The `define` line, without the trailing brace.
    header: String,
    blocks: Vec<Block>,
    current: usize,
    tmp: usize,
}

impl FunctionBuilder {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            blocks: vec![Block {
                label: "entry".to_string(),
                lines: Vec::new(),
                terminated: false,
            }],
            current: 0,
            tmp: 0,
        }
    }

    /// Creates a new block labeled after the hint and returns its id.
    pub fn add_block(&mut self, hint: &str) -> usize {
        let label = format!("{}{}", hint, self.blocks.len());
        self.blocks.push(Block { label, lines: Vec::new(), terminated: false });
        self.blocks.len() - 1
    }

    /// Moves the insertion point.
    pub fn select(&mut self, id: usize) {
        self.current = id;
    }

    pub fn current_id(&self) -> usize {
        self.current
    }

    pub fn label(&self, id: usize) -> &str {
        &self.blocks[id].label
    }

    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current].terminated
    }

    /// A fresh `%tN` temporary name.
    pub fn fresh(&mut self) -> String {
        let name = format!("%t{}", self.tmp);
        self.tmp += 1;
        name
    }

    /// Appends an instruction to the current block.
    pub fn push(&mut self, line: String) {
        let block = &mut self.blocks[self.current];
        debug_assert!(!block.terminated, "instruction after terminator");
        block.lines.push(line);
    }

    /// Appends the block terminator; later terminators are ignored.
    pub fn terminate(&mut self, line: String) {
        let block = &mut self.blocks[self.current];
        if !block.terminated {
            block.lines.push(line);
            block.terminated = true;
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{} {{\n", self.header);
        for block in &self.blocks {
            out.push_str(&block.label);
            out.push_str(":\n");
            for line in &block.lines {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Renders a byte string as an IR `c"..."` constant body.
pub(crate) fn escape_c_string(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{:02X}", b));
        }
    }
    out
}
