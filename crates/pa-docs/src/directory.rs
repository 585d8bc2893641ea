use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A company listed in the monidenum account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Portal-internal id, sent as `idEntreprise`
    pub id: String,
    pub name: String,
    /// SIREN
    pub identifier: String,
    pub legal_form: String,
}

/// Turns the company listing page into records
pub trait DirectoryParser: Send + Sync {
    fn parse(&self, html: &str) -> Vec<Company>;
}

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<tr[^>]*\bdata-id="([^"]+)"[^>]*>(.*?)</tr>"#).expect("valid row regex")
});

static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<td[^>]*>(.*?)</td>").expect("valid cell regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Reads table rows tagged with `data-id`; cells are name, SIREN, legal form
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTableDirectoryParser;

impl DirectoryParser for HtmlTableDirectoryParser {
    fn parse(&self, html: &str) -> Vec<Company> {
        ROW.captures_iter(html)
            .filter_map(|row| {
                let cells: Vec<String> = CELL
                    .captures_iter(&row[2])
                    .map(|cell| cell_text(&cell[1]))
                    .collect();

                match cells.as_slice() {
                    [name, identifier, rest @ ..] => Some(Company {
                        id: row[1].to_string(),
                        name: name.clone(),
                        identifier: identifier.replace(' ', ""),
                        legal_form: rest.first().cloned().unwrap_or_default(),
                    }),
                    _ => None,
                }
            })
            .collect()
    }
}

fn cell_text(fragment: &str) -> String {
    TAG.replace_all(fragment, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
}

/// Company whose id or SIREN (spaces ignored) equals `query`
pub fn find_company<'a>(companies: &'a [Company], query: &str) -> Option<&'a Company> {
    let query = query.replace(' ', "");
    companies
        .iter()
        .find(|c| c.id == query || c.identifier == query)
}
