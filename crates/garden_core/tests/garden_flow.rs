use garden_core::config::QuotaPolicy;
use garden_core::db::open_db_in_memory;
use garden_core::{
    Garden, GardenConfig, GardenError, GardenEvent, MemoryKvBackend, NewNote, Note, NoteId,
    NotePatch, PlantStage, RewriteError,
};
use std::collections::BTreeSet;
use uuid::Uuid;

fn memory_garden() -> Garden<MemoryKvBackend> {
    Garden::open(MemoryKvBackend::new(), GardenConfig::default()).unwrap()
}

fn words(count: usize) -> String {
    vec!["leaf"; count].join(" ")
}

fn link_to(target: NoteId) -> String {
    format!(r##"<a href="#" class="note-link" data-note-id="{target}">ref</a>"##)
}

#[test]
fn deleting_a_parent_cascades_and_reassigns_notes() {
    let conn = open_db_in_memory().unwrap();
    let mut garden = Garden::open_sqlite(&conn, GardenConfig::default()).unwrap();

    let work = garden.add_category("Work", None).unwrap().unwrap();
    let projects = garden
        .add_category("Projects", Some(work.id.as_str()))
        .unwrap()
        .unwrap();
    assert_eq!(projects.level, 1);
    assert_eq!(garden.category_path("Projects"), "Work > Projects");

    let note = garden
        .add_note(NewNote::new("plan", "ship it", "Projects"))
        .unwrap();
    let removed = garden.delete_category("Work").unwrap();
    let removed_names: BTreeSet<String> = removed.into_iter().map(|c| c.name).collect();
    assert_eq!(
        removed_names,
        BTreeSet::from(["Work".to_string(), "Projects".to_string()])
    );

    let categories = garden.categories();
    assert!(categories.iter().all(|c| c.name != "Work" && c.name != "Projects"));
    assert!(categories.iter().any(|c| c.name == "Uncategorized"));
    assert_eq!(garden.note(note.id).unwrap().category, "Uncategorized");
}

#[test]
fn mutual_references_are_both_outlinks_and_backlinks() {
    let mut garden = memory_garden();
    let a = garden.add_note(NewNote::new("A", "", "Essays")).unwrap();
    let b = garden.add_note(NewNote::new("B", "", "Essays")).unwrap();
    garden
        .update_note(a.id, NotePatch::content(link_to(b.id)))
        .unwrap();
    garden
        .update_note(b.id, NotePatch::content(link_to(a.id)))
        .unwrap();

    let graph = garden.link_graph();
    assert_eq!(graph.outlinks_of(a.id), BTreeSet::from([b.id]));
    assert_eq!(graph.backlinks_of(a.id), BTreeSet::from([b.id]));
    assert_eq!(graph.outlinks_of(b.id), BTreeSet::from([a.id]));
    assert_eq!(graph.backlinks_of(b.id), BTreeSet::from([a.id]));

    let linking: Vec<NoteId> = garden.notes_linking_to(a.id).iter().map(|n| n.id).collect();
    assert_eq!(linking, vec![b.id]);
    let outlinked: Vec<NoteId> = garden.outlinked_notes(a.id).iter().map(|n| n.id).collect();
    assert_eq!(outlinked, vec![b.id]);
}

#[test]
fn crossing_one_thousand_words_reaches_sprout() {
    let mut garden = memory_garden();
    let note = garden
        .add_note(NewNote::new("draft", words(950), "Essays"))
        .unwrap();
    assert_eq!(garden.growth_state().total_words, 950);
    assert_eq!(garden.growth_state().current_stage, PlantStage::Seed);
    garden.drain_events();

    garden
        .update_note(note.id, NotePatch::content(words(1_010)))
        .unwrap();

    let state = garden.growth_state();
    assert_eq!(state.total_words, 1_010);
    assert_eq!(state.current_stage, PlantStage::Sprout);
    let achievement = state.achievements.last().unwrap();
    assert_eq!(achievement.stage, PlantStage::Sprout);
    assert_eq!(achievement.total_words, 1_010);
    assert_eq!(
        garden.drain_events(),
        vec![GardenEvent::StageChanged {
            from: PlantStage::Seed,
            to: PlantStage::Sprout,
            total_words: 1_010,
        }]
    );
}

#[test]
fn reopening_repairs_missing_categories_tags_and_growth() {
    let conn = open_db_in_memory().unwrap();
    let orphan = note_with(Uuid::new_v4(), words(12));
    let orphan = Note {
        category: "Imported".to_string(),
        tags: vec!["legacy".to_string()],
        ..orphan
    };
    conn.execute(
        "INSERT INTO kv_entries (key, value) VALUES ('digital-garden-notes', ?1);",
        [serde_json::to_string(&vec![orphan.clone()]).unwrap()],
    )
    .unwrap();

    let garden = Garden::open_sqlite(&conn, GardenConfig::default()).unwrap();
    assert!(garden.categories().iter().any(|c| c.name == "Imported"));
    assert_eq!(garden.tags().find_by_name("legacy").unwrap().count, 1);
    assert_eq!(garden.growth_state().total_words, 12);
    assert_eq!(
        garden.growth_state().note_word_counts.get(&orphan.id),
        Some(&12)
    );
}

#[test]
fn renaming_a_category_repoints_its_notes() {
    let mut garden = memory_garden();
    let note = garden
        .add_note(NewNote::new("log", "", "Work Log"))
        .unwrap();
    assert!(garden.rename_category("Work Log", "Journal").unwrap());
    assert!(!garden.rename_category("Work Log", "Other").unwrap());
    assert!(!garden.rename_category("Journal", "Essays").unwrap());
    assert_eq!(garden.note(note.id).unwrap().category, "Journal");
}

#[test]
fn annotation_round_trip_through_the_facade() {
    let mut garden = memory_garden();
    let target = garden.add_note(NewNote::new("Target", "", "Essays")).unwrap();
    let note = garden
        .add_note(NewNote::new("Source", "<p>read this later</p>", "Essays"))
        .unwrap();

    let (_, annotation_id) = garden.annotate_note(note.id, 3..7, "why?").unwrap();
    let annotations = garden.annotations_of(note.id);
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].anchor_text, "read");

    garden
        .set_annotation_text(note.id, &annotation_id, "because")
        .unwrap();
    assert_eq!(garden.annotations_of(note.id)[0].text, "because");

    garden
        .reclassify_annotation_as_link(note.id, &annotation_id, target.id)
        .unwrap();
    assert!(garden.annotations_of(note.id).is_empty());
    assert_eq!(
        garden.link_graph().backlinks_of(target.id),
        BTreeSet::from([note.id])
    );

    garden.remove_link(note.id, target.id).unwrap();
    assert_eq!(garden.note(note.id).unwrap().content, "<p>read this later</p>");
    assert_eq!(garden.link_graph().edge_count(), 0);
}

#[test]
fn deleting_one_of_two_same_named_categories_keeps_the_other_notes() {
    let mut garden = memory_garden();
    let work = garden.add_category("Work", None).unwrap().unwrap();
    let home = garden.add_category("Home", None).unwrap().unwrap();
    garden.add_category("Ideas", Some(work.id.as_str())).unwrap().unwrap();
    let home_ideas = garden
        .add_category("Ideas", Some(home.id.as_str()))
        .unwrap()
        .unwrap();
    let note = garden.add_note(NewNote::new("idea", "", "Ideas")).unwrap();
    let planned = garden.add_note(NewNote::new("plan", "", "Work")).unwrap();

    garden.delete_category("Work").unwrap();

    let categories = garden.categories();
    assert!(categories.iter().any(|c| c.id == home_ideas.id));
    assert_eq!(garden.note(note.id).unwrap().category, "Ideas");
    assert_eq!(garden.note(planned.id).unwrap().category, "Uncategorized");
}

#[test]
fn renaming_a_shared_name_leaves_notes_on_the_surviving_category() {
    let mut garden = memory_garden();
    let work = garden.add_category("Work", None).unwrap().unwrap();
    let home = garden.add_category("Home", None).unwrap().unwrap();
    garden.add_category("Ideas", Some(work.id.as_str())).unwrap().unwrap();
    garden.add_category("Ideas", Some(home.id.as_str())).unwrap().unwrap();
    let note = garden.add_note(NewNote::new("idea", "", "Ideas")).unwrap();

    assert!(garden.rename_category("Ideas", "Work Ideas").unwrap());
    assert_eq!(garden.note(note.id).unwrap().category, "Ideas");
    assert!(garden.categories().iter().any(|c| c.name == "Ideas"));

    assert!(garden.rename_category("Ideas", "Home Ideas").unwrap());
    assert_eq!(garden.note(note.id).unwrap().category, "Home Ideas");
}

#[test]
fn blank_and_padded_categories_resolve_to_existing_categories() {
    let mut garden = memory_garden();
    let blank = garden.add_note(NewNote::new("n", "", "")).unwrap();
    let padded = garden.add_note(NewNote::new("p", "", " Recipes ")).unwrap();
    assert_eq!(blank.category, "Uncategorized");
    assert_eq!(padded.category, "Recipes");

    let names: Vec<String> = garden.categories().into_iter().map(|c| c.name).collect();
    for note in garden.notes() {
        assert!(names.contains(&note.category), "{} is missing", note.category);
    }

    let moved = garden.move_note(padded.id, "  ").unwrap();
    assert_eq!(moved.category, "Uncategorized");
}

#[test]
fn refused_cascade_leaves_categories_and_notes_untouched() {
    let conn = open_db_in_memory().unwrap();
    let note_id = {
        let mut garden = Garden::open_sqlite(&conn, GardenConfig::default()).unwrap();
        let work = garden.add_category("Work", None).unwrap().unwrap();
        garden
            .add_category("Projects", Some(work.id.as_str()))
            .unwrap()
            .unwrap();
        garden
            .add_note(NewNote::new("plan", "ship it", "Projects"))
            .unwrap()
            .id
    };

    let used = Garden::open_sqlite(&conn, GardenConfig::default())
        .unwrap()
        .storage_usage()
        .unwrap()
        .used_bytes;
    let tight = GardenConfig {
        quota: QuotaPolicy::new(1, used + 1).unwrap(),
        ..GardenConfig::default()
    };
    let mut garden = Garden::open_sqlite(&conn, tight).unwrap();

    let err = garden.delete_category("Work").unwrap_err();
    assert!(matches!(err, GardenError::Store(ref store) if store.is_quota_exceeded()));
    let names: Vec<String> = garden.categories().into_iter().map(|c| c.name).collect();
    assert!(names.contains(&"Work".to_string()));
    assert!(names.contains(&"Projects".to_string()));
    assert_eq!(garden.note(note_id).unwrap().category, "Projects");
}

#[test]
fn external_links_are_listed_edited_and_unlinked() {
    let mut garden = memory_garden();
    let note = garden
        .add_note(NewNote::new(
            "refs",
            r#"<p>see <a href="https://old.example">the docs</a></p>"#,
            "Essays",
        ))
        .unwrap();

    let links = garden.external_links_of(note.id);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].text, "the docs");

    garden
        .set_external_link_url(note.id, &links[0].id, "https://new.example")
        .unwrap();
    assert_eq!(garden.external_links_of(note.id)[0].url, "https://new.example");

    garden.remove_external_link(note.id, &links[0].id).unwrap();
    assert_eq!(garden.note(note.id).unwrap().content, "<p>see the docs</p>");
    assert!(matches!(
        garden.remove_external_link(note.id, &links[0].id),
        Err(GardenError::Rewrite(RewriteError::ExternalLinkNotFound(_)))
    ));
}

fn note_with(id: NoteId, content: String) -> Note {
    Note {
        id,
        title: String::new(),
        content,
        category: "Essays".to_string(),
        tags: Vec::new(),
        created_at: 0,
        updated_at: 0,
        is_published: false,
    }
}
