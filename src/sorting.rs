use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingCategory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub correct_category_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingContent {
    #[serde(default)]
    pub categories: Vec<SortingCategory>,
    #[serde(default)]
    pub items: Vec<SortingItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRemoval {
    pub items_removed: usize,
}

impl SortingContent {
    /// One-time repair for content saved before ids were mandatory: mints
    /// missing category/item ids and assigns the first category to items
    /// without a `correct_category_id`. Returns whether anything changed.
    pub fn normalize_legacy(&mut self) -> bool {
        let mut changed = false;
        for category in &mut self.categories {
            if category.id.is_empty() {
                category.id = new_id();
                changed = true;
            }
        }
        let first_category = self.categories.first().map(|c| c.id.clone());
        for item in &mut self.items {
            if item.id.is_empty() {
                item.id = new_id();
                changed = true;
            }
            if item.correct_category_id.is_empty() {
                if let Some(ref cid) = first_category {
                    item.correct_category_id = cid.clone();
                    changed = true;
                }
            }
        }
        changed
    }

    /// Appends a category with a label derived from the current count
    /// ("Category 1", "Category 2", ...). Returns its id.
    pub fn add_category(&mut self) -> String {
        let id = new_id();
        self.categories.push(SortingCategory {
            id: id.clone(),
            label: format!("Category {}", self.categories.len() + 1),
        });
        id
    }

    pub fn referencing_items(&self, category_id: &str) -> usize {
        self.items
            .iter()
            .filter(|item| item.correct_category_id == category_id)
            .count()
    }

    /// Removes the category and cascades to every item assigned to it.
    /// Returns `None` if the category is unknown.
    pub fn delete_category(&mut self, category_id: &str) -> Option<CategoryRemoval> {
        let pos = self.categories.iter().position(|c| c.id == category_id)?;
        self.categories.remove(pos);
        let before = self.items.len();
        self.items
            .retain(|item| item.correct_category_id != category_id);
        Some(CategoryRemoval {
            items_removed: before - self.items.len(),
        })
    }

    /// Appends an empty-text item pre-assigned to the category. Returns the
    /// item id, or `None` if the category is unknown.
    pub fn add_item_to_category(&mut self, category_id: &str) -> Option<String> {
        if !self.categories.iter().any(|c| c.id == category_id) {
            return None;
        }
        let id = new_id();
        self.items.push(SortingItem {
            id: id.clone(),
            text: String::new(),
            image_url: None,
            alt_text: None,
            correct_category_id: category_id.to_string(),
        });
        Some(id)
    }
}
