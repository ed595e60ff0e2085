use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use crate::models::{GradeCategory, GradeItem};

lazy_static! {
    static ref GRADE_TABLE: Selector = Selector::parse("table#z_l").unwrap();
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref HEADER_CELL: Selector = Selector::parse("th").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("td, th").unwrap();
    static ref PERCENT: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*%$").unwrap();
    static ref SCORE: Regex = Regex::new(r"^(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)$").unwrap();
    static ref NOT_GRADED: Regex = Regex::new(r"^-\s*/\s*(\d+(?:\.\d+)?)").unwrap();
}

// Parses the grades page markup into categories with their items, in table order.
pub fn parse_grade_table(html_content: &str) -> Vec<GradeCategory> {
    let document = Html::parse_document(html_content);
    let table = match find_grade_table(&document) {
        Some(table) => table,
        None => return Vec::new(),
    };

    let rows = table.select(&ROW).skip(1).map(|row| row_texts(&row));
    parse_rows(rows)
}

// The grades table carries a fixed id; older layouts only identify it by a header mentioning "grade".
fn find_grade_table(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&GRADE_TABLE).next().or_else(|| {
        document.select(&TABLE).find(|table| {
            table
                .select(&HEADER_CELL)
                .next()
                .map(|th| cell_text(&th).to_lowercase().contains("grade"))
                .unwrap_or(false)
        })
    })
}

fn row_texts(row: &ElementRef) -> Vec<String> {
    row.select(&CELL).map(|cell| cell_text(&cell)).collect()
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().map(str::trim).collect()
}

#[derive(Default)]
struct ParseState {
    done: Vec<GradeCategory>,
    current: Option<GradeCategory>,
}

/// Rebuilds the category/item hierarchy from flat rows of cell text.
///
/// A row whose first cell holds text opens a new category; a row with an empty
/// first cell and at least three cells is an item of the open category. Items
/// seen before any category, and rows matching neither shape, are dropped.
pub fn parse_rows<I, R>(rows: I) -> Vec<GradeCategory>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[String]>,
{
    let state = rows.into_iter().fold(ParseState::default(), |mut state, row| {
        let texts = row.as_ref();
        if texts.len() < 2 {
            return state;
        }

        if is_category_cell(&texts[0]) {
            let grade_pct = texts[1..].iter().find_map(|t| parse_percent(t));
            if let Some(finished) = state.current.replace(GradeCategory::new(texts[0].clone(), grade_pct)) {
                state.done.push(finished);
            }
        } else if texts[0].is_empty() && texts.len() >= 3 {
            if let Some(category) = state.current.as_mut() {
                if let Some(item) = parse_item(texts) {
                    category.items.push(item);
                }
            }
        }
        state
    });

    let mut categories = state.done;
    categories.extend(state.current);
    categories
}

fn is_category_cell(text: &str) -> bool {
    !text.is_empty() && text != "-"
}

fn parse_item(texts: &[String]) -> Option<GradeItem> {
    let name = &texts[1];
    if name.is_empty() {
        return None;
    }

    let mut score = None;
    let mut out_of = None;
    let mut percentage = None;

    for text in &texts[2..] {
        if let Some((s, total)) = parse_score(text) {
            score = Some(s);
            out_of = Some(total);
        } else if let Some(total) = parse_not_graded(text) {
            out_of = Some(total);
        } else if let Some(pct) = parse_percent(text) {
            percentage = Some(pct);
        }
    }

    if percentage.is_none() {
        if let (Some(s), Some(total)) = (score, out_of) {
            if total != 0.0 {
                percentage = Some(round2(s / total * 100.0));
            }
        }
    }

    Some(GradeItem {
        name: name.clone(),
        score,
        out_of,
        percentage,
    })
}

// "83 / 100"
pub fn parse_score(text: &str) -> Option<(f64, f64)> {
    let caps = SCORE.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

// "- / 100", an item that has not been graded yet
pub fn parse_not_graded(text: &str) -> Option<f64> {
    NOT_GRADED.captures(text)?[1].parse().ok()
}

// "83 %"
pub fn parse_percent(text: &str) -> Option<f64> {
    PERCENT.captures(text)?[1].parse().ok()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
