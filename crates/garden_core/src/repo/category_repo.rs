//! Category tree manager.
//!
//! # Responsibility
//! - CRUD over the flat category list stored under `digital-garden-categories`.
//! - Build the forest view and breadcrumb paths on demand.
//! - Cascade deletes over the transitive closure of `parent_id`.
//!
//! # Invariants
//! - Categories are only created under an existing parent and are never
//!   re-parented, so the parent graph stays an acyclic forest.
//! - `add` rejects a duplicate name among siblings; `rename` rejects a name
//!   used anywhere, because notes reference categories by name.
//! - Deleting never touches notes; the caller reassigns orphaned notes.

use crate::model::category::{default_categories, Category, CategoryId, CategoryNode};
use crate::model::palette_color_for;
use crate::store::{CollectionKey, CollectionStore, KvBackend, LoadOutcome, StoreResult};
use log::info;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const NEW_CATEGORY_ICON: &str = "📁";
const PATH_SEPARATOR: &str = " > ";

/// Category tree manager over one collection store.
pub struct CategoryTree<'s, B: KvBackend> {
    store: &'s CollectionStore<B>,
    seed_defaults: bool,
}

impl<'s, B: KvBackend> CategoryTree<'s, B> {
    /// `seed_defaults` decides what an absent or unreadable collection yields.
    pub fn new(store: &'s CollectionStore<B>, seed_defaults: bool) -> Self {
        Self {
            store,
            seed_defaults,
        }
    }

    /// Current flat category list, seeded on first run.
    pub fn list(&self) -> Vec<Category> {
        match self.store.load::<Vec<Category>>(CollectionKey::Categories) {
            LoadOutcome::Loaded(categories) => categories,
            _ if self.seed_defaults => default_categories(),
            _ => Vec::new(),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Category> {
        self.list().into_iter().find(|category| category.name == name)
    }

    /// Creates a category under an optional parent.
    ///
    /// Returns `Ok(None)` when the name is blank, a sibling already uses it,
    /// or `parent_id` does not name an existing category.
    pub fn add(&self, name: &str, parent_id: Option<&str>) -> StoreResult<Option<Category>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut categories = self.list();
        let sibling_taken = categories.iter().any(|category| {
            category.parent_id.as_deref() == parent_id && category.name == name
        });
        if sibling_taken {
            return Ok(None);
        }

        let level = match parent_id {
            Some(parent_id) => match categories.iter().find(|category| category.id == parent_id)
            {
                Some(parent) => parent.level + 1,
                None => return Ok(None),
            },
            None => 0,
        };

        let category = new_category(name, parent_id.map(str::to_string), level);
        categories.push(category.clone());
        self.store.save(CollectionKey::Categories, &categories)?;
        info!(
            "event=category_add module=category status=ok level={} has_parent={}",
            level,
            parent_id.is_some()
        );
        Ok(Some(category))
    }

    /// Renames a category.
    ///
    /// Returns `Ok(false)` when `old_name` is unknown, `new_name` is blank, or
    /// another category anywhere already uses `new_name`.
    pub fn rename(&self, old_name: &str, new_name: &str) -> StoreResult<bool> {
        let new_name = new_name.trim();
        let mut categories = self.list();
        if !rename_allowed(&categories, old_name, new_name) {
            return Ok(false);
        }
        if new_name == old_name {
            return Ok(true);
        }
        let Some(index) = categories
            .iter()
            .position(|category| category.name == old_name)
        else {
            return Ok(false);
        };

        categories[index].name = new_name.to_string();
        self.store.save(CollectionKey::Categories, &categories)?;
        Ok(true)
    }

    /// Deletes a category and every transitive descendant in one write.
    ///
    /// Returns the removed categories; empty when `name` is unknown.
    pub fn delete(&self, name: &str) -> StoreResult<Vec<Category>> {
        let Some((removed, kept)) = split_subtree(self.list(), name) else {
            return Ok(Vec::new());
        };

        self.store.save(CollectionKey::Categories, &kept)?;
        info!(
            "event=category_delete module=category status=ok removed={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Creates root categories for every name not present yet, in one write.
    ///
    /// Returns the created categories; nothing is written when all exist.
    pub fn ensure_exists(&self, names: &[String]) -> StoreResult<Vec<Category>> {
        let mut categories = self.list();
        let mut created = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty()
                || categories.iter().any(|category| category.name == name)
                || created.iter().any(|category: &Category| category.name == name)
            {
                continue;
            }
            created.push(new_category(name, None, 0));
        }
        if created.is_empty() {
            return Ok(created);
        }

        categories.extend(created.iter().cloned());
        self.store.save(CollectionKey::Categories, &categories)?;
        Ok(created)
    }

    /// Rewrites cached `level` values that disagree with the parent chain.
    ///
    /// Returns how many categories were fixed; nothing is written when none.
    pub fn repair_levels(&self) -> StoreResult<usize> {
        let mut categories = self.list();
        let depths: Vec<Option<usize>> = categories
            .iter()
            .map(|category| root_distance(&categories, &category.id))
            .collect();

        let mut fixed = 0;
        for (category, depth) in categories.iter_mut().zip(depths) {
            let Some(depth) = depth.and_then(|depth| u32::try_from(depth).ok()) else {
                continue;
            };
            if category.level != depth {
                category.level = depth;
                fixed += 1;
            }
        }
        if fixed > 0 {
            self.store.save(CollectionKey::Categories, &categories)?;
        }
        Ok(fixed)
    }

    pub fn build_tree(&self) -> Vec<CategoryNode> {
        build_tree(&self.list())
    }

    /// Breadcrumb path such as `Work > Projects > Q3`.
    pub fn resolve_path(&self, name: &str) -> String {
        resolve_path(&self.list(), name)
    }
}

fn new_category(name: &str, parent_id: Option<CategoryId>, level: u32) -> Category {
    let id = Uuid::new_v4();
    Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: NEW_CATEGORY_ICON.to_string(),
        color: palette_color_for(&id),
        description: Some(format!("{name} notes")),
        parent_id,
        level,
    }
}

/// Whether `old_name` exists and `new_name` (already trimmed) is non-blank
/// and unused by any other category.
pub fn rename_allowed(categories: &[Category], old_name: &str, new_name: &str) -> bool {
    if new_name.is_empty() || !categories.iter().any(|category| category.name == old_name) {
        return false;
    }
    new_name == old_name || !categories.iter().any(|category| category.name == new_name)
}

/// Splits `categories` into the subtree rooted at the first category named
/// `name` and the rest. `None` when no category has that name.
pub fn split_subtree(
    categories: Vec<Category>,
    name: &str,
) -> Option<(Vec<Category>, Vec<Category>)> {
    let target = categories.iter().find(|category| category.name == name)?;
    let doomed: HashSet<CategoryId> = descendant_ids(&categories, &target.id)
        .into_iter()
        .chain(std::iter::once(target.id.clone()))
        .collect();
    Some(
        categories
            .into_iter()
            .partition(|category| doomed.contains(&category.id)),
    )
}

/// Ids of every transitive descendant of `root_id`, depth-first.
pub fn descendant_ids(categories: &[Category], root_id: &str) -> Vec<CategoryId> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for category in categories {
        if let Some(parent_id) = category.parent_id.as_deref() {
            children
                .entry(parent_id)
                .or_default()
                .push(category.id.as_str());
        }
    }

    let mut found = Vec::new();
    let mut visited: HashSet<&str> = HashSet::from([root_id]);
    let mut stack: Vec<&str> = vec![root_id];
    while let Some(current) = stack.pop() {
        for &child in children.get(current).map(Vec::as_slice).unwrap_or_default() {
            if visited.insert(child) {
                found.push(child.to_string());
                stack.push(child);
            }
        }
    }
    found
}

/// Builds the forest in O(n) via an id→index map.
///
/// A category whose parent is missing is treated as a root so it stays
/// reachable.
pub fn build_tree(categories: &[Category]) -> Vec<CategoryNode> {
    let index_by_id: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(index, category)| (category.id.as_str(), index))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); categories.len()];
    let mut roots = Vec::new();
    for (index, category) in categories.iter().enumerate() {
        match category
            .parent_id
            .as_deref()
            .and_then(|parent_id| index_by_id.get(parent_id))
        {
            Some(&parent_index) => children[parent_index].push(index),
            None => roots.push(index),
        }
    }

    roots
        .into_iter()
        .map(|index| assemble_node(categories, &children, index))
        .collect()
}

fn assemble_node(categories: &[Category], children: &[Vec<usize>], index: usize) -> CategoryNode {
    CategoryNode {
        category: categories[index].clone(),
        children: children[index]
            .iter()
            .map(|&child| assemble_node(categories, children, child))
            .collect(),
    }
}

/// Joins names from the root down to `name`. Unknown names resolve to themselves.
pub fn resolve_path(categories: &[Category], name: &str) -> String {
    let Some(start) = categories.iter().find(|category| category.name == name) else {
        return name.to_string();
    };

    let mut segments = vec![start.name.as_str()];
    let mut current = start;
    // Bounded walk: a damaged payload must not loop forever.
    for _ in 0..categories.len() {
        let Some(parent) = current.parent_id.as_deref().and_then(|parent_id| {
            categories.iter().find(|category| category.id == parent_id)
        }) else {
            break;
        };
        segments.push(parent.name.as_str());
        current = parent;
    }
    segments.reverse();
    segments.join(PATH_SEPARATOR)
}

/// Number of parent hops from `id` to its root, `None` if the walk does not
/// terminate within `categories.len()` steps or `id` is unknown.
pub fn root_distance(categories: &[Category], id: &str) -> Option<usize> {
    let by_id: HashMap<&str, &Category> = categories
        .iter()
        .map(|category| (category.id.as_str(), category))
        .collect();
    let mut current = *by_id.get(id)?;
    for hops in 0..=categories.len() {
        match current
            .parent_id
            .as_deref()
            .and_then(|parent| by_id.get(parent).copied())
        {
            Some(parent) => current = parent,
            None => return Some(hops),
        }
    }
    None
}
