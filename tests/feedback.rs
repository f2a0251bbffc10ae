use speech_coach::feedback::{feedback, overall_assessment, recommendations};
use speech_coach::schema::{ScoreVector, Target};

#[test]
fn overall_extremes_have_fixed_assessments() {
    assert_eq!(
        overall_assessment(5),
        "Excellent performance - Outstanding speaker"
    );
    assert_eq!(
        overall_assessment(1),
        "Needs significant improvement - Focus on fundamentals"
    );
}

#[test]
fn weak_targets_get_recommendations_and_low_overall_closes_remedially() {
    // speech_pace 3, pausing_fluency 4, loudness 5, pitch 4, articulation 4, expression 5, fillers 4, overall 2
    let scores = ScoreVector::new([3, 4, 5, 4, 4, 5, 4, 2]);
    let recs = recommendations(&scores);

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].category, "Speech Pace");
    assert_eq!(recs[0].issue, "Pacing needs improvement");
    assert!(!recs.iter().any(|r| r.category == "Pausing & Fluency"));
    let last = recs.last().unwrap();
    assert_eq!(last.category, "Overall");
    assert_eq!(last.issue, "Needs significant improvement");
}

#[test]
fn strong_overall_closes_positively() {
    let recs = recommendations(&ScoreVector::new([5, 5, 5, 5, 5, 5, 1, 4]));
    let categories: Vec<&str> = recs.iter().map(|r| r.category).collect();
    assert_eq!(categories, ["Filler Words", "Overall"]);
    assert_eq!(recs[1].issue, "Strong performance");
}

#[test]
fn all_weak_targets_follow_column_order() {
    let recs = recommendations(&ScoreVector::new([1; 8]));
    let categories: Vec<&str> = recs.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        [
            "Speech Pace",
            "Pausing & Fluency",
            "Volume Control",
            "Pitch Variation",
            "Articulation",
            "Expression",
            "Filler Words",
            "Overall",
        ]
    );
}

#[test]
fn detailed_scores_describe_each_target() {
    let report = feedback(&ScoreVector::new([1, 2, 3, 4, 5, 1, 2, 4]));
    assert_eq!(report.overall_assessment, "Good performance - Strong speaking skills");
    let pace = &report.detailed_scores[&Target::SpeechPace];
    assert_eq!(pace.score, 1);
    assert_eq!(
        pace.description,
        "Too slow - consider increasing your speaking rate"
    );
    assert_eq!(
        report.detailed_scores[&Target::FillerWords].description,
        "Too many fillers - practice reducing them"
    );
}
