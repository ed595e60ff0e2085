use std::collections::HashSet;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use crate::models::Course;

lazy_static! {
    static ref HOME_LINK: Selector = Selector::parse(r#"a[href*="/d2l/home/"]"#).unwrap();
    static ref ANY_LINK: Selector = Selector::parse(r#"a[href*="/d2l/"]"#).unwrap();
    static ref HOME_OU: Regex = Regex::new(r"/d2l/home/(\d+)").unwrap();
    static ref ANY_OU: Regex = Regex::new(r"/d2l/(?:home|le/content|lms/grades)/(\d+)").unwrap();
}

// Link texts this short are icons or "Go", never course names.
const MIN_NAME_LEN: usize = 4;

// Finds enrolled courses among the anchors of the LMS home page, in page order.
pub fn discover_courses(html_content: &str) -> Vec<Course> {
    let document = Html::parse_document(html_content);

    let courses = collect_courses(anchors(&document, &HOME_LINK), &HOME_OU);
    if !courses.is_empty() {
        return courses;
    }
    collect_courses(anchors(&document, &ANY_LINK), &ANY_OU)
}

fn anchors(document: &Html, selector: &Selector) -> Vec<(String, String)> {
    document
        .select(selector)
        .map(|a| {
            let href = a.value().attr("href").unwrap_or("").to_string();
            let text = a.text().collect::<Vec<_>>().join(" ");
            (href, text.split_whitespace().collect::<Vec<_>>().join(" "))
        })
        .collect()
}

/// Keeps the first link seen for each organizational unit, skipping links
/// whose text is missing or too short to be a course name.
pub fn collect_courses<I>(links: I, pattern: &Regex) -> Vec<Course>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut seen = HashSet::new();
    let mut courses = Vec::new();

    for (href, text) in links {
        let ou = match pattern.captures(&href) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };
        if text.chars().count() < MIN_NAME_LEN {
            continue;
        }
        if seen.insert(ou.clone()) {
            courses.push(Course { name: text, ou });
        }
    }

    courses
}
