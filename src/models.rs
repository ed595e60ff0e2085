use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// A course discovered on the LMS home page, keyed by its organizational unit id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    pub ou: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradeCategory {
    pub category: String,
    pub grade_pct: Option<f64>,
    pub items: Vec<GradeItem>,
}

impl GradeCategory {
    pub fn new(category: impl Into<String>, grade_pct: Option<f64>) -> Self {
        Self {
            category: category.into(),
            grade_pct,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradeItem {
    pub name: String,
    pub score: Option<f64>,
    pub out_of: Option<f64>,
    pub percentage: Option<f64>,
}

// Grades of a single course as read from its grades page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradeReport {
    pub course: String,
    pub course_ou: String,
    pub retrieved_at: DateTime<Local>,
    pub categories: Vec<GradeCategory>,
}

// Top-level document written to grades.json.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Report {
    pub retrieved_at: DateTime<Local>,
    pub courses: Vec<GradeReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> Report {
        let at = Local.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        let mut quizzes = GradeCategory::new("Quizzes", Some(85.0));
        quizzes.items.push(GradeItem {
            name: "Quiz 1".to_string(),
            score: Some(17.0),
            out_of: Some(20.0),
            percentage: Some(85.0),
        });
        quizzes.items.push(GradeItem {
            name: "Quiz 2".to_string(),
            score: None,
            out_of: Some(20.0),
            percentage: None,
        });
        Report {
            retrieved_at: at,
            courses: vec![GradeReport {
                course: "Math 10".to_string(),
                course_ou: "6877".to_string(),
                retrieved_at: at,
                categories: vec![quizzes, GradeCategory::new("Exams", None)],
            }],
        }
    }

    #[test]
    fn report_survives_json_round_trip() {
        let report = sample_report();
        let json = serde_json::to_string_pretty(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn unset_values_serialize_as_null() {
        let value = serde_json::to_value(sample_report()).unwrap();
        let quiz2 = &value["courses"][0]["categories"][0]["items"][1];
        assert!(quiz2["score"].is_null());
        assert!(quiz2["percentage"].is_null());
        assert_eq!(quiz2["out_of"], 20.0);
        assert!(value["courses"][0]["categories"][1]["grade_pct"].is_null());
    }
}
