//! Note templates: built-in system templates plus user templates persisted
//! under `digital-garden-templates`.

use crate::model::now_epoch_ms;
use crate::model::template::{NewTemplate, NoteTemplate, TemplatePatch};
use crate::store::{CollectionKey, CollectionStore, KvBackend, StoreResult};
use uuid::Uuid;

const SYSTEM_ID_PREFIX: &str = "system-";

/// Template store over one collection store.
pub struct TemplateStore<'s, B: KvBackend> {
    store: &'s CollectionStore<B>,
}

impl<'s, B: KvBackend> TemplateStore<'s, B> {
    pub fn new(store: &'s CollectionStore<B>) -> Self {
        Self { store }
    }

    /// User-created templates only.
    pub fn list_custom(&self) -> Vec<NoteTemplate> {
        self.store
            .load::<Vec<NoteTemplate>>(CollectionKey::Templates)
            .into_value_or_default()
    }

    /// System templates first, then user templates.
    pub fn list_all(&self) -> Vec<NoteTemplate> {
        let mut templates = system_templates(now_epoch_ms());
        templates.extend(self.list_custom());
        templates
    }

    pub fn get(&self, id: &str) -> Option<NoteTemplate> {
        self.list_all().into_iter().find(|template| template.id == id)
    }

    /// Creates a user template. `Ok(None)` for a blank name.
    pub fn create(&self, new_template: NewTemplate) -> StoreResult<Option<NoteTemplate>> {
        let name = new_template.name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let now = now_epoch_ms();
        let template = NoteTemplate {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: new_template.description,
            content: new_template.content,
            category: new_template.category,
            tags: new_template.tags,
            created_at: now,
            updated_at: now,
            is_system: false,
        };
        let mut templates = self.list_custom();
        templates.push(template.clone());
        self.store.save(CollectionKey::Templates, &templates)?;
        Ok(Some(template))
    }

    /// Edits a user template. `Ok(None)` for unknown or system ids.
    pub fn update(&self, id: &str, patch: TemplatePatch) -> StoreResult<Option<NoteTemplate>> {
        let mut templates = self.list_custom();
        let Some(template) = templates.iter_mut().find(|template| template.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name.filter(|name| !name.trim().is_empty()) {
            template.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            template.description = Some(description);
        }
        if let Some(content) = patch.content {
            template.content = content;
        }
        if let Some(category) = patch.category {
            template.category = Some(category);
        }
        if let Some(tags) = patch.tags {
            template.tags = tags;
        }
        template.updated_at = now_epoch_ms().max(template.created_at);

        let template = template.clone();
        self.store.save(CollectionKey::Templates, &templates)?;
        Ok(Some(template))
    }

    /// Deletes a user template. `Ok(false)` for unknown or system ids.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut templates = self.list_custom();
        let before = templates.len();
        templates.retain(|template| template.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        self.store.save(CollectionKey::Templates, &templates)?;
        Ok(true)
    }
}

/// Built-in templates. Never persisted.
pub fn system_templates(now: i64) -> Vec<NoteTemplate> {
    [
        (
            "diary",
            "Diary",
            "Daily life and reflections",
            "# Diary\n\n## Weather\n\n## Mood\n\n## Highlights\n- \n\n## Reflections\n> \n\n## Plans for tomorrow\n- [ ] \n",
        ),
        (
            "meeting",
            "Meeting Notes",
            "Minutes and action items",
            "# Meeting Notes\n\n## Details\n- **Topic**: \n- **Attendees**: \n\n## Agenda\n1. \n\n## Decisions\n- \n\n## Action items\n- [ ] **Task**: | **Owner**: | **Due**: \n",
        ),
        (
            "reading",
            "Reading Notes",
            "Takeaways from a book or article",
            "# Reading Notes\n\n## Source\n- **Title**: \n- **Author**: \n\n## Key ideas\n- \n\n## Quotes\n> \n\n## My thoughts\n",
        ),
    ]
    .into_iter()
    .map(|(id, name, description, content)| NoteTemplate {
        id: format!("{SYSTEM_ID_PREFIX}{id}"),
        name: name.to_string(),
        description: Some(description.to_string()),
        content: content.to_string(),
        category: None,
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
        is_system: true,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::{system_templates, TemplateStore};
    use crate::config::QuotaPolicy;
    use crate::model::template::{NewTemplate, TemplatePatch};
    use crate::store::{CollectionStore, MemoryKvBackend};

    #[test]
    fn system_templates_are_flagged_and_prefixed() {
        let templates = system_templates(0);
        assert_eq!(templates.len(), 3);
        assert!(templates
            .iter()
            .all(|template| template.is_system && template.id.starts_with("system-")));
    }

    #[test]
    fn custom_template_lifecycle() {
        let store = CollectionStore::new(MemoryKvBackend::new(), QuotaPolicy::default());
        let templates = TemplateStore::new(&store);

        let created = templates
            .create(NewTemplate {
                name: " Weekly review ".to_string(),
                content: "## Wins".to_string(),
                ..NewTemplate::default()
            })
            .unwrap()
            .expect("named template should be created");
        assert_eq!(created.name, "Weekly review");
        assert_eq!(templates.list_all().len(), 4);

        let updated = templates
            .update(
                &created.id,
                TemplatePatch {
                    content: Some("## Wins\n## Misses".to_string()),
                    ..TemplatePatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(updated.content.contains("Misses"));
        assert!(templates
            .update("system-diary", TemplatePatch::default())
            .unwrap()
            .is_none());

        assert!(templates.delete(&created.id).unwrap());
        assert!(!templates.delete(&created.id).unwrap());
        assert!(templates.list_custom().is_empty());
    }
}
