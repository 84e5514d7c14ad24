use std::sync::OnceLock;

use regex::Regex;

/// Layout-independent content of a report, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Line(String),
    Heading(String),
    Label(String),
    /// JPEG bytes, drawn at a fixed 200x200 pt box.
    Image(Vec<u8>),
    Prose(String),
    Preformatted(String),
    Spacer,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl ReportDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn extend(&mut self, blocks: impl IntoIterator<Item = Block>) {
        self.blocks.extend(blocks);
    }
}

const FENCE: &str = "```";

fn fenced_region() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").expect("fenced region pattern is valid")
    })
}

/// Splits a model response into prose and preformatted blocks.
///
/// Every parsed fenced region becomes one preformatted block holding its
/// inner text; the prose around and between regions is kept verbatim and
/// whitespace-only pieces are dropped. Fence markers that never form a
/// region turn the whole response preformatted. No markers at all means
/// one prose block.
pub fn segment_response(response: &str) -> Vec<Block> {
    if !response.contains(FENCE) {
        return prose_block(response).into_iter().collect();
    }
    let mut blocks = Vec::new();
    let mut cursor = 0;
    for captures in fenced_region().captures_iter(response) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        blocks.extend(prose_block(&response[cursor..whole.start()]));
        blocks.push(Block::Preformatted(inner.as_str().to_string()));
        cursor = whole.end();
    }
    if cursor == 0 {
        return vec![Block::Preformatted(response.to_string())];
    }
    blocks.extend(prose_block(&response[cursor..]));
    blocks
}

fn prose_block(text: &str) -> Option<Block> {
    if text.trim().is_empty() {
        None
    } else {
        Some(Block::Prose(text.to_string()))
    }
}
