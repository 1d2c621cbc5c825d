//! Character infobox fields pulled out of wiki page text.
//!
//! Fan-wiki character pages carry labelled lines such as `Real Name: Natasha
//! Romanoff` or `Gender Female`, and a `Powers:` heading followed by one
//! power per line. The extractor is line based and forgiving: unknown lines
//! are ignored and a label whose value sits on the next line is also read.

use serde::{Deserialize, Serialize};

/// Longest value kept for a single field, in characters.
const MAX_VALUE_CHARS: usize = 200;
/// Most entries kept from a powers list.
const MAX_POWERS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: Option<String>,
    pub current_alias: Option<String>,
    pub aliases: Option<String>,
    pub gender: Option<String>,
    pub eyes: Option<String>,
    pub skin: Option<String>,
    pub features: Option<String>,
    pub origin: Option<String>,
    pub living_status: Option<String>,
    pub reality: Option<String>,
    pub powers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    CurrentAlias,
    Aliases,
    Gender,
    Eyes,
    Skin,
    Features,
    Origin,
    LivingStatus,
    Reality,
    Powers,
}

const LABELS: &[(&str, Field)] = &[
    ("current alias", Field::CurrentAlias),
    ("real name", Field::Name),
    ("name", Field::Name),
    ("aliases", Field::Aliases),
    ("gender", Field::Gender),
    ("eyes", Field::Eyes),
    ("skin", Field::Skin),
    ("unusual features", Field::Features),
    ("origin", Field::Origin),
    ("living status", Field::LivingStatus),
    ("reality", Field::Reality),
    ("powers", Field::Powers),
];

/// Match a label at the start of `line`; returns the field and the text
/// after the label and an optional colon. With `need_colon` a label followed
/// by text only counts when a colon separates them.
fn label_of(line: &str, need_colon: bool) -> Option<(Field, &str)> {
    let lower = line.to_ascii_lowercase();
    for (label, field) in LABELS {
        if !lower.starts_with(label) { continue; }
        let rest = &line[label.len()..];
        // "Origins of ..." or "Namesake" are not labels
        if rest.chars().next().is_some_and(|c| c.is_alphanumeric()) { continue; }
        if need_colon && !rest.trim_start().is_empty() && !rest.trim_start().starts_with(':') { continue; }
        return Some((*field, rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace()).trim_end()));
    }
    None
}

fn clip(value: &str) -> String { value.chars().take(MAX_VALUE_CHARS).collect::<String>().trim().to_string() }

impl CharacterProfile {
    /// Extract the labelled fields from `text`. The first occurrence of each
    /// field wins.
    pub fn extract(text: &str) -> Self {
        let mut profile = CharacterProfile::default();
        // field whose label stood alone and may take the next line as value
        let mut pending: Option<Field> = None;
        let mut in_powers = false;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() { continue; }
            match label_of(line, in_powers) {
                Some((Field::Powers, rest)) => {
                    pending = None;
                    in_powers = profile.powers.is_empty();
                    if in_powers && !rest.is_empty() {
                        profile.powers.push(clip(rest));
                    }
                }
                Some((field, "")) => {
                    in_powers = false;
                    pending = Some(field);
                }
                Some((field, rest)) => {
                    in_powers = false;
                    pending = None;
                    profile.set(field, rest);
                }
                None if in_powers => {
                    if profile.powers.len() < MAX_POWERS {
                        profile.powers.push(clip(line));
                    }
                }
                None => {
                    if let Some(field) = pending.take() {
                        profile.set(field, line);
                    }
                }
            }
        }
        profile
    }

    fn set(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::CurrentAlias => &mut self.current_alias,
            Field::Aliases => &mut self.aliases,
            Field::Gender => &mut self.gender,
            Field::Eyes => &mut self.eyes,
            Field::Skin => &mut self.skin,
            Field::Features => &mut self.features,
            Field::Origin => &mut self.origin,
            Field::LivingStatus => &mut self.living_status,
            Field::Reality => &mut self.reality,
            Field::Powers => return,
        };
        if slot.is_none() && !value.is_empty() {
            *slot = Some(clip(value));
        }
    }

    pub fn is_empty(&self) -> bool { self.sections().is_empty() }

    /// Non-empty fields grouped for display, in a fixed order.
    pub fn sections(&self) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
        let groups: [(&'static str, Vec<(&'static str, Option<String>)>); 4] = [
            ("Basic Character Information", vec![
                ("Name", self.name.clone()),
                ("Current Alias", self.current_alias.clone()),
                ("Aliases", self.aliases.clone()),
            ]),
            ("Appearance and Physical Traits", vec![
                ("Gender", self.gender.clone()),
                ("Eye Color", self.eyes.clone()),
                ("Skin Color", self.skin.clone()),
                ("Notable Features", self.features.clone()),
            ]),
            ("Origin and Status", vec![
                ("Origin", self.origin.clone()),
                ("Living Status", self.living_status.clone()),
                ("Reality", self.reality.clone()),
            ]),
            ("Powers & Abilities", vec![
                ("Powers", (!self.powers.is_empty()).then(|| self.powers.join("; "))),
            ]),
        ];
        groups
            .into_iter()
            .map(|(title, fields)| (title, fields.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect::<Vec<_>>()))
            .filter(|(_, fields)| !fields.is_empty())
            .collect()
    }
}
