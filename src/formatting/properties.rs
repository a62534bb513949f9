// src/formatting/properties.rs
//! Normalizes typed page properties into the small portable value set.
//!
//! Total over the property union: kinds this version doesn't know log a
//! warning and normalize to null, so a remote schema addition never breaks
//! a build.

use crate::formatting::rich_text::render_rich_text;
use crate::model::{FormulaResult, Page, PropertyValue, RollupResult, User, UserDetail};
use crate::types::{FileRef, NormalizedValue, Person, RenderMode};

/// Reduces one property value to its normalized shape.
pub fn normalize_property(property: &PropertyValue) -> NormalizedValue {
    match property {
        PropertyValue::Title(runs) | PropertyValue::RichText(runs) => {
            NormalizedValue::String(render_rich_text(runs, RenderMode::Markdown, false))
        }
        PropertyValue::Number(number) => number
            .map(NormalizedValue::Number)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::Select(option) | PropertyValue::Status(option) => option
            .clone()
            .map(NormalizedValue::Option)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::MultiSelect(options) => NormalizedValue::List(
            options
                .iter()
                .cloned()
                .map(NormalizedValue::Option)
                .collect(),
        ),
        PropertyValue::Date(date) => date
            .clone()
            .map(NormalizedValue::Date)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::People(users) => NormalizedValue::List(
            users
                .iter()
                .filter_map(normalize_user)
                .map(NormalizedValue::Person)
                .collect(),
        ),
        PropertyValue::Files(files) => NormalizedValue::List(
            files
                .iter()
                .map(|file| {
                    NormalizedValue::File(FileRef {
                        name: file.name.clone(),
                        url: file.source.url().to_string(),
                    })
                })
                .collect(),
        ),
        PropertyValue::Checkbox(checked) => NormalizedValue::Bool(*checked),
        PropertyValue::Url(value)
        | PropertyValue::Email(value)
        | PropertyValue::PhoneNumber(value) => value
            .clone()
            .map(NormalizedValue::String)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::Formula(formula) => normalize_formula(formula),
        PropertyValue::Rollup(rollup) => normalize_rollup(rollup),
        PropertyValue::CreatedBy(user) | PropertyValue::LastEditedBy(user) => normalize_user(user)
            .map(NormalizedValue::Person)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::CreatedTime(time) | PropertyValue::LastEditedTime(time) => {
            NormalizedValue::String(time.clone())
        }
        PropertyValue::UniqueId { number, .. } => number
            .map(NormalizedValue::Number)
            .unwrap_or(NormalizedValue::Null),
        PropertyValue::Unknown { kind } => {
            log::warn!("Property type '{}' is not supported yet.", kind);
            NormalizedValue::Null
        }
    }
}

fn normalize_formula(formula: &FormulaResult) -> NormalizedValue {
    match formula {
        FormulaResult::String(value) => value
            .clone()
            .map(NormalizedValue::String)
            .unwrap_or(NormalizedValue::Null),
        FormulaResult::Number(value) => value
            .map(NormalizedValue::Number)
            .unwrap_or(NormalizedValue::Null),
        FormulaResult::Boolean(value) => value
            .map(NormalizedValue::Bool)
            .unwrap_or(NormalizedValue::Null),
        FormulaResult::Date(value) => value
            .clone()
            .map(NormalizedValue::Date)
            .unwrap_or(NormalizedValue::Null),
        FormulaResult::Unknown { kind } => {
            log::warn!("Unknown formula type '{}' detected!", kind);
            NormalizedValue::Null
        }
    }
}

fn normalize_rollup(rollup: &RollupResult) -> NormalizedValue {
    match rollup {
        RollupResult::Number(value) => value
            .map(NormalizedValue::Number)
            .unwrap_or(NormalizedValue::Null),
        RollupResult::Date(value) => value
            .clone()
            .map(NormalizedValue::Date)
            .unwrap_or(NormalizedValue::Null),
        RollupResult::Array(items) => {
            NormalizedValue::List(items.iter().map(normalize_property).collect())
        }
        RollupResult::Unknown { kind } => {
            log::warn!("Unknown rollup type '{}' detected!", kind);
            NormalizedValue::Null
        }
    }
}

/// Extracts the accessible human behind a user record.
///
/// Real people map directly. A bot authorized by a user recurses into that
/// user. Inaccessible users and workspace-internal bots yield `None`.
pub fn normalize_user(user: &User) -> Option<Person> {
    match &user.detail {
        Some(UserDetail::Person {
            name,
            avatar_url,
            email,
        }) => Some(Person {
            name: name.clone(),
            avatar: avatar_url.clone(),
            email: email.clone(),
        }),
        Some(UserDetail::Bot {
            owner: Some(owner), ..
        }) => normalize_user(owner),
        _ => None,
    }
}

/// The page's title: its first `title`-kind property, rendered plain.
pub fn page_title(page: &Page) -> String {
    page.properties
        .values()
        .find_map(|property| match property {
            PropertyValue::Title(runs) => {
                Some(render_rich_text(runs, RenderMode::Markdown, false))
            }
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateValue, RichTextRun, SelectOption};
    use pretty_assertions::assert_eq;

    fn person(name: &str, email: Option<&str>) -> User {
        User {
            id: format!("id-{}", name),
            detail: Some(UserDetail::Person {
                name: Some(name.to_string()),
                avatar_url: None,
                email: email.map(str::to_string),
            }),
        }
    }

    #[test]
    fn title_and_rich_text_render_to_strings() {
        let mut bold = RichTextRun::plain("World");
        bold.annotations.bold = true;
        let property = PropertyValue::Title(vec![RichTextRun::plain("Hello "), bold]);
        assert_eq!(
            normalize_property(&property),
            NormalizedValue::String("Hello **World**".to_string())
        );
    }

    #[test]
    fn scalars_normalize_directly() {
        assert_eq!(
            normalize_property(&PropertyValue::Number(Some(4.5))),
            NormalizedValue::Number(4.5)
        );
        assert_eq!(
            normalize_property(&PropertyValue::Number(None)),
            NormalizedValue::Null
        );
        assert_eq!(
            normalize_property(&PropertyValue::Checkbox(true)),
            NormalizedValue::Bool(true)
        );
        assert_eq!(
            normalize_property(&PropertyValue::Url(Some("https://x".to_string()))),
            NormalizedValue::String("https://x".to_string())
        );
    }

    #[test]
    fn multi_select_normalizes_to_option_list() {
        let options = vec![
            SelectOption {
                name: "rust".to_string(),
                color: Some("orange".to_string()),
            },
            SelectOption {
                name: "notes".to_string(),
                color: None,
            },
        ];
        let NormalizedValue::List(values) =
            normalize_property(&PropertyValue::MultiSelect(options.clone()))
        else {
            panic!("expected list");
        };
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], NormalizedValue::Option(options[0].clone()));
    }

    #[test]
    fn people_keep_only_accessible_humans() {
        let inaccessible = User {
            id: "ghost".to_string(),
            detail: None,
        };
        let property =
            PropertyValue::People(vec![person("Ada", Some("ada@example.com")), inaccessible]);

        let NormalizedValue::List(values) = normalize_property(&property) else {
            panic!("expected list");
        };
        assert_eq!(values.len(), 1);
        assert_eq!(
            values[0],
            NormalizedValue::Person(Person {
                name: Some("Ada".to_string()),
                avatar: None,
                email: Some("ada@example.com".to_string()),
            })
        );
    }

    #[test]
    fn bot_recurses_into_its_owning_user() {
        let bot = User {
            id: "bot-1".to_string(),
            detail: Some(UserDetail::Bot {
                name: Some("Integration".to_string()),
                owner: Some(Box::new(person("Ada", None))),
            }),
        };
        assert_eq!(
            normalize_user(&bot),
            Some(Person {
                name: Some("Ada".to_string()),
                avatar: None,
                email: None,
            })
        );

        let internal_bot = User {
            id: "bot-2".to_string(),
            detail: Some(UserDetail::Bot {
                name: Some("Workspace bot".to_string()),
                owner: None,
            }),
        };
        assert_eq!(normalize_user(&internal_bot), None);
    }

    #[test]
    fn formula_recurses_into_its_result() {
        assert_eq!(
            normalize_property(&PropertyValue::Formula(FormulaResult::Boolean(Some(true)))),
            NormalizedValue::Bool(true)
        );
        assert_eq!(
            normalize_property(&PropertyValue::Formula(FormulaResult::Date(Some(
                DateValue {
                    start: "2024-01-01".to_string(),
                    end: None,
                    time_zone: None,
                }
            )))),
            NormalizedValue::Date(DateValue {
                start: "2024-01-01".to_string(),
                end: None,
                time_zone: None,
            })
        );
    }

    #[test]
    fn rollup_array_maps_the_normalizer_over_elements() {
        let rollup = PropertyValue::Rollup(RollupResult::Array(vec![
            PropertyValue::Number(Some(1.0)),
            PropertyValue::Checkbox(false),
        ]));
        assert_eq!(
            normalize_property(&rollup),
            NormalizedValue::List(vec![
                NormalizedValue::Number(1.0),
                NormalizedValue::Bool(false),
            ])
        );
    }

    #[test]
    fn unknown_kinds_normalize_to_null() {
        assert_eq!(
            normalize_property(&PropertyValue::Unknown {
                kind: "verification".to_string()
            }),
            NormalizedValue::Null
        );
    }
}
