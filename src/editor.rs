use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sorting::SortingContent;

pub const PADDING_MAX: i64 = 160;
pub const DIFFICULTY_MAX: f64 = 10.0;

pub fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTheme {
    Light,
    Gray,
    Theme,
    Dark,
    Black,
    Custom,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStyle {
    pub theme: StyleTheme,
    // Only meaningful when theme == Custom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
}

impl Default for BlockStyle {
    fn default() -> Self {
        BlockStyle {
            theme: StyleTheme::Light,
            custom_color: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidthClass {
    S,
    M,
    L,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingPreset {
    S,
    M,
    L,
}

impl PaddingPreset {
    pub fn pixels(self) -> i64 {
        match self {
            PaddingPreset::S => 24,
            PaddingPreset::M => 64,
            PaddingPreset::L => 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockLayout {
    pub width: WidthClass,
    pub padding_top: i64,
    pub padding_bottom: i64,
}

impl Default for BlockLayout {
    fn default() -> Self {
        BlockLayout {
            width: WidthClass::M,
            padding_top: PaddingPreset::M.pixels(),
            padding_bottom: PaddingPreset::M.pixels(),
        }
    }
}

fn clamp_padding(v: i64) -> i64 {
    v.clamp(0, PADDING_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Human,
    Ai,
}

/// Per-field provenance for the learning fingerprint. A field with no entry
/// has never been set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behaviour_tag: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_skill: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_pattern: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Provenance>,
}

/// The "learning fingerprint": all fields independently nullable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behaviour_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub provenance: FieldProvenance,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default)]
    pub behaviour_tag: Option<String>,
    #[serde(default)]
    pub cognitive_skill: Option<String>,
    #[serde(default)]
    pub learning_pattern: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BlockMetadata {
    /// Shallow merge: only fields present in the patch are assigned, and each
    /// assigned field takes the given provenance.
    pub fn apply_patch(&mut self, patch: MetadataPatch, source: Provenance) {
        if let Some(v) = patch.behaviour_tag {
            self.behaviour_tag = Some(v);
            self.provenance.behaviour_tag = Some(source);
        }
        if let Some(v) = patch.cognitive_skill {
            self.cognitive_skill = Some(v);
            self.provenance.cognitive_skill = Some(source);
        }
        if let Some(v) = patch.learning_pattern {
            self.learning_pattern = Some(v);
            self.provenance.learning_pattern = Some(source);
        }
        if let Some(v) = patch.difficulty {
            self.difficulty = Some(v.clamp(0.0, DIFFICULTY_MAX));
            self.provenance.difficulty = Some(source);
        }
        if let Some(v) = patch.notes {
            self.notes = Some(v);
            self.provenance.notes = Some(source);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(default)]
    pub theme: Option<StyleTheme>,
    #[serde(default)]
    pub custom_color: Option<String>,
}

impl BlockStyle {
    pub fn apply_patch(&mut self, patch: StylePatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(color) = patch.custom_color {
            self.custom_color = Some(color);
        }
        // The custom color only exists alongside the custom theme.
        if self.theme != StyleTheme::Custom {
            self.custom_color = None;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPatch {
    #[serde(default)]
    pub width: Option<WidthClass>,
    #[serde(default)]
    pub padding_top: Option<i64>,
    #[serde(default)]
    pub padding_bottom: Option<i64>,
    #[serde(default)]
    pub preset: Option<PaddingPreset>,
}

impl BlockLayout {
    /// Preset (if any) applies first, then explicit paddings override it.
    pub fn apply_patch(&mut self, patch: LayoutPatch) {
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(preset) = patch.preset {
            self.padding_top = preset.pixels();
            self.padding_bottom = preset.pixels();
        }
        if let Some(top) = patch.padding_top {
            self.padding_top = clamp_padding(top);
        }
        if let Some(bottom) = patch.padding_bottom {
            self.padding_bottom = clamp_padding(bottom);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    All,
    Horizontal,
    None,
}

impl Default for BorderMode {
    fn default() -> Self {
        BorderMode::All
    }
}

/// One entry of an ordered-list block. Nesting is limited to two levels, so
/// `level` is always 0 or 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub text: String,
    #[serde(default)]
    pub level: u8,
}

/// Type-specific content. The serde tag doubles as the block type on the
/// wire and in the `blocks.block_type` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BlockContent {
    Heading {
        heading: String,
    },
    Subheading {
        subheading: String,
    },
    Paragraph {
        body: String,
    },
    ParagraphWithHeading {
        heading: String,
        body: String,
    },
    ParagraphWithSubheading {
        subheading: String,
        body: String,
    },
    Columns {
        column_one: String,
        column_two: String,
    },
    Table {
        table_content: serde_json::Value,
        #[serde(default)]
        border_mode: BorderMode,
    },
    OrderedList {
        #[serde(default)]
        items: Vec<ListItem>,
    },
    ImageFullWidth {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    ImageCompare {
        before_url: String,
        after_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before_alt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        after_alt: Option<String>,
    },
    SortingActivity(SortingContent),
}

impl BlockContent {
    pub fn block_type(&self) -> &'static str {
        match self {
            BlockContent::Heading { .. } => "heading",
            BlockContent::Subheading { .. } => "subheading",
            BlockContent::Paragraph { .. } => "paragraph",
            BlockContent::ParagraphWithHeading { .. } => "paragraphWithHeading",
            BlockContent::ParagraphWithSubheading { .. } => "paragraphWithSubheading",
            BlockContent::Columns { .. } => "columns",
            BlockContent::Table { .. } => "table",
            BlockContent::OrderedList { .. } => "orderedList",
            BlockContent::ImageFullWidth { .. } => "imageFullWidth",
            BlockContent::ImageCompare { .. } => "imageCompare",
            BlockContent::SortingActivity(_) => "sortingActivity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Format,
    Metadata,
    Appearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn parse(raw: &str) -> Option<MoveDirection> {
        match raw.to_ascii_lowercase().as_str() {
            "up" => Some(MoveDirection::Up),
            "down" => Some(MoveDirection::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub order_index: i64,
    #[serde(default)]
    pub style: BlockStyle,
    #[serde(default)]
    pub layout: BlockLayout,
    #[serde(default)]
    pub metadata: BlockMetadata,
    pub content: BlockContent,
}

impl Block {
    pub fn new(content: BlockContent) -> Block {
        Block {
            id: new_block_id(),
            order_index: 0,
            style: BlockStyle::default(),
            layout: BlockLayout::default(),
            metadata: BlockMetadata::default(),
            content,
        }
    }
}

/// The block list for one page. Vec order is the single source of truth;
/// `order_index` is re-derived by a full pass after every mutation and is
/// never trusted as input.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    blocks: Vec<Block>,
    open_panel: Option<(String, Panel)>,
}

impl BlockList {
    /// Builds a list from already-ordered rows. Stored order indexes are
    /// discarded and recomputed from the given order.
    pub fn from_blocks(blocks: Vec<Block>) -> BlockList {
        let mut list = BlockList {
            blocks,
            open_panel: None,
        };
        list.renumber();
        list
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn open_panel(&self) -> Option<(&str, Panel)> {
        self.open_panel.as_ref().map(|(id, p)| (id.as_str(), *p))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    fn renumber(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.order_index = i as i64;
        }
    }

    /// Inserts a fresh block at `at` (clamped to the list bounds; `None` or
    /// out-of-range appends) and returns its id. Never fails.
    pub fn insert_block(&mut self, content: BlockContent, at: Option<usize>) -> String {
        let mut block = Block::new(content);
        let id = block.id.clone();
        let pos = match at {
            Some(i) if i <= self.blocks.len() => i,
            _ => self.blocks.len(),
        };
        block.order_index = pos as i64;
        self.blocks.insert(pos, block);
        self.renumber();
        id
    }

    /// Inserts a block with caller-supplied style/layout defaults (e.g. from
    /// workspace setup). Same index semantics as `insert_block`.
    pub fn insert_block_with(
        &mut self,
        content: BlockContent,
        style: BlockStyle,
        layout: BlockLayout,
        at: Option<usize>,
    ) -> String {
        let id = self.insert_block(content, at);
        if let Some(pos) = self.position(&id) {
            self.blocks[pos].style = style;
            self.blocks[pos].layout = layout;
        }
        id
    }

    /// Replaces the block's content wholesale. No-op if the id is unknown.
    pub fn update_content(&mut self, id: &str, content: BlockContent) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.blocks[pos].content = content;
                true
            }
            None => false,
        }
    }

    pub fn update_style(&mut self, id: &str, patch: StylePatch) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.blocks[pos].style.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub fn update_layout(&mut self, id: &str, patch: LayoutPatch) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.blocks[pos].layout.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub fn update_metadata(&mut self, id: &str, patch: MetadataPatch, source: Provenance) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.blocks[pos].metadata.apply_patch(patch, source);
                true
            }
            None => false,
        }
    }

    /// Deep copy of the block immediately after the original, with a fresh
    /// id. Returns the new id, or `None` if the original is unknown.
    pub fn duplicate_block(&mut self, id: &str) -> Option<String> {
        let pos = self.position(id)?;
        let mut copy = self.blocks[pos].clone();
        copy.id = new_block_id();
        let new_id = copy.id.clone();
        self.blocks.insert(pos + 1, copy);
        self.renumber();
        Some(new_id)
    }

    /// Removes the block and renumbers. Clears the focused panel if it
    /// referenced the deleted block. No-op if the id is unknown.
    pub fn delete_block(&mut self, id: &str) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.blocks.remove(pos);
        if self
            .open_panel
            .as_ref()
            .map(|(open_id, _)| open_id == id)
            .unwrap_or(false)
        {
            self.open_panel = None;
        }
        self.renumber();
        true
    }

    /// Swaps the block with its immediate neighbor. A move past either
    /// boundary is a guaranteed no-op, not an error. Returns false only when
    /// the id is unknown.
    pub fn move_block(&mut self, id: &str, direction: MoveDirection) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        match direction {
            MoveDirection::Up if pos > 0 => {
                self.blocks.swap(pos, pos - 1);
                self.renumber();
            }
            MoveDirection::Down if pos + 1 < self.blocks.len() => {
                self.blocks.swap(pos, pos + 1);
                self.renumber();
            }
            _ => {}
        }
        true
    }

    /// Single atomic remove+reinsert for drag-and-drop. `destination: None`
    /// means the drop landed outside any target; both that and
    /// source == destination are no-ops. Returns false when `source` is out
    /// of range.
    pub fn reorder_by_drag(&mut self, source: usize, destination: Option<usize>) -> bool {
        if source >= self.blocks.len() {
            return false;
        }
        let Some(dest) = destination else {
            return true;
        };
        if dest == source {
            return true;
        }
        let block = self.blocks.remove(source);
        let dest = dest.min(self.blocks.len());
        self.blocks.insert(dest, block);
        self.renumber();
        true
    }

    /// Opens a panel for the block, closing any other open panel (at most
    /// one panel is ever open). Returns false if the id is unknown.
    pub fn open_panel_for(&mut self, id: &str, panel: Panel) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.open_panel = Some((id.to_string(), panel));
        true
    }

    pub fn close_panel(&mut self) {
        self.open_panel = None;
    }

    /// Indents an ordered-list item by one level, to the two-level maximum.
    /// Returns false if the block is unknown, not an ordered list, or the
    /// item index is out of range.
    pub fn indent_list_item(&mut self, id: &str, item: usize) -> bool {
        self.with_list_item(id, item, |entry| {
            if entry.level == 0 {
                entry.level = 1;
            }
        })
    }

    /// Outdents an ordered-list item by one level, to level 0.
    pub fn outdent_list_item(&mut self, id: &str, item: usize) -> bool {
        self.with_list_item(id, item, |entry| {
            if entry.level > 0 {
                entry.level -= 1;
            }
        })
    }

    fn with_list_item<F: FnOnce(&mut ListItem)>(&mut self, id: &str, item: usize, f: F) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let BlockContent::OrderedList { items } = &mut self.blocks[pos].content else {
            return false;
        };
        match items.get_mut(item) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }
}
