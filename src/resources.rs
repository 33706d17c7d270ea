//! Coping resource catalog.

use crate::store::models::CopingResource;
use crate::store::Store;

pub const DEFAULT_CATEGORY: &str = "breathing";

fn resource(id: &str, category: &str, title: &str, body: &str) -> CopingResource {
    CopingResource {
        id: id.to_string(),
        category: category.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        is_active: true,
        usage_count: 0,
    }
}

/// Built-in set loaded at startup.
pub fn default_resources() -> Vec<CopingResource> {
    vec![
        resource(
            "box-breathing",
            "breathing",
            "Box breathing",
            "Breathe in for 4, hold for 4, out for 4, hold for 4. Repeat four times.",
        ),
        resource(
            "4-7-8-breathing",
            "breathing",
            "4-7-8 breathing",
            "Inhale through your nose for 4, hold for 7, exhale slowly through your mouth for 8.",
        ),
        resource(
            "5-4-3-2-1",
            "grounding",
            "5-4-3-2-1 grounding",
            "Name 5 things you see, 4 you can touch, 3 you hear, 2 you smell and 1 you taste.",
        ),
        resource(
            "urge-surfing",
            "craving",
            "Urge surfing",
            "Notice the craving like a wave. It rises, peaks and falls. Breathe and ride it out for 15 minutes.",
        ),
        resource(
            "play-the-tape",
            "craving",
            "Play the tape forward",
            "Picture how the next day goes if you use, then how it goes if you don't.",
        ),
        resource(
            "call-a-friend",
            "connection",
            "Reach out",
            "Text or call one person you trust and tell them how today is going.",
        ),
    ]
}

/// Lookup order: exact active id, then the least used active resource in
/// `category`, then the most used active breathing exercise.
pub fn pick_resource(
    store: &dyn Store,
    id: Option<&str>,
    category: Option<&str>,
) -> Option<CopingResource> {
    let active: Vec<CopingResource> = store
        .coping_resources()
        .into_iter()
        .filter(|r| r.is_active)
        .collect();

    if let Some(id) = id {
        return active.into_iter().find(|r| r.id == id);
    }
    if let Some(cat) = category {
        return active
            .into_iter()
            .filter(|r| r.category == cat)
            .min_by_key(|r| r.usage_count);
    }
    active
        .into_iter()
        .filter(|r| r.category == DEFAULT_CATEGORY)
        .max_by_key(|r| r.usage_count)
}
