use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info, warn};
use serde_json::to_string_pretty;
use crate::models::{Course, GradeReport, Report};
use crate::utils::browser::Session;
use crate::utils::config::Config;
use crate::utils::courses::discover_courses;
use crate::utils::parser::parse_grade_table;

pub const REPORT_FILE: &str = "grades.json";
pub const ERROR_SCREENSHOT: &str = "error_grades.png";

// Banner shown by the LMS when grades are hidden for a course.
const UNAVAILABLE: &str = "not available";

pub fn is_unavailable(page_text: &str) -> bool {
    page_text.to_lowercase().contains(UNAVAILABLE)
}

pub fn screenshot_path(dir: &Path, ou: &str) -> PathBuf {
    dir.join(format!("grades_{}.png", ou))
}

pub fn markup_path(dir: &Path, ou: &str) -> PathBuf {
    dir.join(format!("grades_{}.html", ou))
}

// Lists the courses to fetch: either the single configured one or those linked from the home page.
pub async fn find_courses(session: &Session, config: &Config) -> Result<Vec<Course>> {
    if let Some(ou) = &config.course_ou {
        info!("Using configured course (OU: {})", ou);
        return Ok(vec![Course {
            name: format!("Course {}", ou),
            ou: ou.clone(),
        }]);
    }

    info!("Finding courses...");
    session.goto(config.home_url()?.as_str()).await?;
    session.settle().await?;

    let courses = discover_courses(&session.content().await?);
    for course in &courses {
        info!("  {} (OU: {})", course.name, course.ou);
    }
    Ok(courses)
}

// Opens the course's grades page, trying the course home "Grades" link when the direct URL is unavailable.
async fn open_grades_page(session: &Session, config: &Config, ou: &str) -> Result<bool> {
    session.goto(config.grades_url(ou)?.as_str()).await?;
    session.settle().await?;
    if !is_unavailable(&session.body_text().await?) {
        return Ok(true);
    }

    debug!("Grades URL unavailable for {}, trying the course navigation", ou);
    session.goto(config.course_home_url(ou)?.as_str()).await?;
    session.settle().await?;

    let home = session.url().await?;
    match session.click_link_with_text("Grades").await {
        Ok(()) => {
            if let Err(e) = session.wait_url_change(&home, session.wait_timeout()).await {
                debug!("Grades link did not navigate: {}", e);
            }
            if let Err(e) = session.settle().await {
                debug!("Grades link did not settle: {}", e);
            }
        }
        Err(e) => {
            debug!("No usable Grades link: {}", e);
            return Ok(false);
        }
    }

    Ok(!is_unavailable(&session.body_text().await?))
}

pub async fn fetch_course_grades(session: &Session, config: &Config, course: &Course) -> Result<Option<GradeReport>> {
    info!("Fetching: {}", course.name);

    if !open_grades_page(session, config, &course.ou).await? {
        warn!("  Grades not available.");
        return Ok(None);
    }

    let html = session.content().await?;
    session
        .screenshot(&screenshot_path(&config.output_dir, &course.ou), true)
        .await?;
    write_markup(&config.output_dir, &course.ou, &html).await?;

    Ok(Some(GradeReport {
        course: course.name.clone(),
        course_ou: course.ou.clone(),
        retrieved_at: Local::now(),
        categories: parse_grade_table(&html),
    }))
}

/// Logs in, discovers courses and fetches each one in order.
///
/// Returns `None` when no course could be found. A failure on any course aborts the
/// whole run; courses whose grades are hidden are skipped.
pub async fn collect_report(session: &Session, config: &Config) -> Result<Option<Report>> {
    crate::utils::auth::login(session, config).await?;

    let courses = find_courses(session, config).await?;
    if courses.is_empty() {
        warn!("No courses found.");
        return Ok(None);
    }

    let mut reports = Vec::new();
    for course in &courses {
        if let Some(report) = fetch_course_grades(session, config, course).await? {
            reports.push(report);
        }
    }

    Ok(Some(Report {
        retrieved_at: Local::now(),
        courses: reports,
    }))
}

pub async fn write_markup(dir: &Path, ou: &str, html: &str) -> Result<PathBuf> {
    let path = markup_path(dir, ou);
    tokio::fs::write(&path, html)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn save_report(dir: &Path, report: &Report) -> Result<PathBuf> {
    let path = dir.join(REPORT_FILE);
    let json = to_string_pretty(report).context("Failed to serialize the grade report")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::models::GradeCategory;
    use crate::utils::fixture_server::{config_for, page, serve};

    #[test]
    fn unavailable_banner_is_case_insensitive() {
        assert!(is_unavailable("Grades are Not Available for this course."));
        assert!(!is_unavailable("Final Calculated Grade 85 %"));
    }

    #[test]
    fn artifact_names_are_keyed_by_ou() {
        let dir = Path::new("out");
        assert_eq!(screenshot_path(dir, "6877"), PathBuf::from("out/grades_6877.png"));
        assert_eq!(markup_path(dir, "6877"), PathBuf::from("out/grades_6877.html"));
    }

    #[tokio::test]
    async fn report_file_is_overwritten_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let first = Report {
            retrieved_at: Local::now(),
            courses: vec![GradeReport {
                course: "Math 10".to_string(),
                course_ou: "6877".to_string(),
                retrieved_at: Local::now(),
                categories: vec![GradeCategory::new("Quizzes", Some(85.0))],
            }],
        };
        save_report(dir.path(), &first).await.unwrap();

        let second = Report {
            retrieved_at: Local::now(),
            courses: Vec::new(),
        };
        let path = save_report(dir.path(), &second).await.unwrap();

        let written: Report = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, second);
    }

    #[tokio::test]
    async fn markup_dump_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        ensure_output_dir(&dir.path().join("nested")).await.unwrap();
        let nested = dir.path().join("nested");

        write_markup(&nested, "42", "<html>old, longer content</html>").await.unwrap();
        let path = write_markup(&nested, "42", "<html>new</html>").await.unwrap();

        assert_eq!(path, nested.join("grades_42.html"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html>new</html>");
    }

    fn course(ou: &str) -> Course {
        Course {
            name: format!("Course {}", ou),
            ou: ou.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore] // Requires Chromium to be installed
    async fn grades_page_fallback_and_unavailable_course() {
        let hidden = page("<p>Grades are not available for this course.</p>");
        let grades_path = |ou: &str| format!("/d2l/lms/grades/my_grades/main.d2l?ou={}", ou);
        let pages = HashMap::from([
            // Direct URL works.
            (grades_path("3"), include_str!("../../tests/fixtures/grades_page.html").to_string()),
            // Direct URL hidden, course home links to the grades tool.
            (grades_path("1"), hidden.clone()),
            ("/d2l/home/1".to_string(), page(r#"<a href="/d2l/le/content/1">Content</a> <a href="/d2l/tools/1/mygrades">My grades</a>"#)),
            ("/d2l/tools/1/mygrades".to_string(), include_str!("../../tests/fixtures/grades_page.html").to_string()),
            // Hidden everywhere.
            (grades_path("2"), hidden),
            ("/d2l/home/2".to_string(), page(r#"<a href="/d2l/le/content/2">Content</a>"#)),
        ]);
        let addr = serve(pages).await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(addr, dir.path(), &[]);
        let session = Session::launch(&config).await.expect("failed to launch");

        let direct = fetch_course_grades(&session, &config, &course("3")).await.unwrap().expect("direct grades");
        assert_eq!(direct.categories.len(), 3);

        let recovered = fetch_course_grades(&session, &config, &course("1")).await.unwrap().expect("fallback grades");
        assert_eq!(recovered.course_ou, "1");
        assert_eq!(recovered.categories.len(), 3);
        assert_eq!(recovered.categories[0].category, "Quizzes");
        assert!(screenshot_path(dir.path(), "1").exists());
        assert!(markup_path(dir.path(), "1").exists());

        let missing = fetch_course_grades(&session, &config, &course("2")).await.unwrap();
        assert!(missing.is_none());
        assert!(!screenshot_path(dir.path(), "2").exists());
        assert!(!markup_path(dir.path(), "2").exists());

        session.close().await.expect("close failed");
    }
}
