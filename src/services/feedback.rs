use crate::models::assessment::DimensionScores;
use crate::repositories::progress_repo::ItemForGrading;

/// Per-student aggregate over one assignment's item rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentAggregate {
    pub total_items: i64,
    /// Items with a recording. Completion measures audio, not scoring.
    pub completed_items: i64,
    /// Items still unscored after the run.
    pub missing_items: i64,
    pub avg_accuracy: f64,
    pub avg_fluency: f64,
    pub avg_pronunciation: f64,
    pub avg_completeness: f64,
    pub total_score: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mean_of<F: Fn(&ItemForGrading) -> Option<f64>>(items: &[ItemForGrading], pick: F) -> f64 {
    let values: Vec<f64> = items.iter().filter_map(&pick).collect();
    if values.is_empty() {
        return 0.0;
    }
    round1(values.iter().sum::<f64>() / values.len() as f64)
}

/// Arithmetic means per dimension over items where that dimension is set,
/// 0 when nothing is scored. Dimension means carry one decimal; the total
/// is the mean of the four dimension means at two decimals.
pub fn aggregate(items: &[ItemForGrading]) -> StudentAggregate {
    let avg_accuracy = mean_of(items, |i| i.accuracy_score);
    let avg_fluency = mean_of(items, |i| i.fluency_score);
    let avg_pronunciation = mean_of(items, |i| i.pronunciation_score);
    let avg_completeness = mean_of(items, |i| i.completeness_score);

    StudentAggregate {
        total_items: items.len() as i64,
        completed_items: items.iter().filter(|i| i.recording_url.is_some()).count() as i64,
        missing_items: items.iter().filter(|i| i.accuracy_score.is_none()).count() as i64,
        avg_accuracy,
        avg_fluency,
        avg_pronunciation,
        avg_completeness,
        total_score: round2(
            (avg_accuracy + avg_fluency + avg_pronunciation + avg_completeness) / 4.0,
        ),
    }
}

fn band_phrase(score: f64) -> &'static str {
    if score >= 90.0 {
        "極佳"
    } else if score >= 80.0 {
        "良好"
    } else if score >= 70.0 {
        "尚可"
    } else {
        "需要加強"
    }
}

/// Short per-item feedback: one phrase per dimension, joined with a
/// full-width comma.
pub fn item_feedback(scores: &DimensionScores) -> String {
    [
        format!("準確度{}", band_phrase(scores.accuracy)),
        format!("流暢度{}", band_phrase(scores.fluency)),
        format!("發音{}", band_phrase(scores.pronunciation)),
        format!("完整度{}", band_phrase(scores.completeness)),
    ]
    .join("，")
}

fn overall_phrase(total_score: f64) -> &'static str {
    if total_score >= 90.0 {
        "整體表現優異"
    } else if total_score >= 80.0 {
        "整體表現良好"
    } else if total_score >= 70.0 {
        "整體表現尚可"
    } else {
        "整體表現仍需加強"
    }
}

fn suggestion_phrase(total_score: f64) -> &'static str {
    if total_score >= 90.0 {
        "請繼續保持"
    } else if total_score >= 80.0 {
        "再多加練習即可更上一層樓"
    } else if total_score >= 70.0 {
        "建議針對較弱的部分反覆練習"
    } else {
        "建議重新聆聽範例音檔並多加練習"
    }
}

/// Assignment-level feedback: completion rate, overall banding, notable
/// strong (≥85) and weak (<70) dimensions, and a banded suggestion. With
/// nothing completed, only the zero-completion clause is emitted.
pub fn assignment_feedback(agg: &StudentAggregate) -> String {
    if agg.completed_items == 0 {
        return format!(
            "完成了 0/{} 題，尚未有任何錄音，請先完成錄音練習再進行評分。",
            agg.total_items
        );
    }

    let mut clauses = vec![
        format!("完成了 {}/{} 題", agg.completed_items, agg.total_items),
        overall_phrase(agg.total_score).to_string(),
    ];

    let dims = [
        ("準確度", agg.avg_accuracy),
        ("流暢度", agg.avg_fluency),
        ("發音", agg.avg_pronunciation),
        ("完整度", agg.avg_completeness),
    ];

    let strong: Vec<&str> = dims
        .iter()
        .filter(|(_, v)| *v >= 85.0)
        .map(|(label, _)| *label)
        .collect();
    if !strong.is_empty() {
        clauses.push(format!("其中{}表現突出", strong.join("、")));
    }

    let weak: Vec<&str> = dims
        .iter()
        .filter(|(_, v)| *v < 70.0)
        .map(|(label, _)| *label)
        .collect();
    if !weak.is_empty() {
        clauses.push(format!("{}仍需多加練習", weak.join("、")));
    }

    clauses.push(suggestion_phrase(agg.total_score).to_string());

    format!("{}。", clauses.join("，"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(
        recording: bool,
        scores: Option<(f64, f64, f64, f64)>,
    ) -> ItemForGrading {
        ItemForGrading {
            id: 1,
            student_assignment_id: 1,
            content_item_id: 1,
            text: "How are you?".to_string(),
            recording_url: recording.then(|| "http://localhost/audio/a.webm".to_string()),
            accuracy_score: scores.map(|s| s.0),
            fluency_score: scores.map(|s| s.1),
            pronunciation_score: scores.map(|s| s.2),
            completeness_score: scores.map(|s| s.3),
            last_assessed_at: scores.map(|_| chrono::Utc::now()),
        }
    }

    #[test]
    fn test_band_boundaries_are_inclusive() {
        assert_eq!(band_phrase(90.0), "極佳");
        assert_eq!(band_phrase(89.9), "良好");
        assert_eq!(band_phrase(80.0), "良好");
        assert_eq!(band_phrase(79.9), "尚可");
        assert_eq!(band_phrase(70.0), "尚可");
        assert_eq!(band_phrase(69.9), "需要加強");
    }

    #[test]
    fn test_item_feedback_joins_with_fullwidth_comma() {
        let text = item_feedback(&DimensionScores {
            accuracy: 92.0,
            fluency: 85.0,
            pronunciation: 71.0,
            completeness: 60.0,
        });
        assert_eq!(text, "準確度極佳，流暢度良好，發音尚可，完整度需要加強");
    }

    #[test]
    fn test_aggregate_all_items_scored() {
        let items = vec![
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
        ];
        let agg = aggregate(&items);
        assert_eq!(agg.total_items, 3);
        assert_eq!(agg.completed_items, 3);
        assert_eq!(agg.missing_items, 0);
        assert_eq!(agg.avg_pronunciation, 92.0);
        // (88 + 85 + 92 + 90) / 4
        assert_eq!(agg.total_score, 88.75);
    }

    #[test]
    fn test_aggregate_single_scored_item() {
        let items = vec![
            item(false, None),
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
            item(false, None),
        ];
        let agg = aggregate(&items);
        assert_eq!(agg.total_items, 3);
        assert_eq!(agg.completed_items, 1);
        assert_eq!(agg.missing_items, 2);
        // Single-item mean per dimension.
        assert_eq!(agg.avg_pronunciation, 92.0);
        assert_eq!(agg.total_score, 88.75);
    }

    #[test]
    fn test_aggregate_unscored_recording_counts_completed_not_scored() {
        // A recording whose assessment failed: completed, still missing.
        let items = vec![
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
            item(true, None),
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
        ];
        let agg = aggregate(&items);
        assert_eq!(agg.completed_items, 3);
        assert_eq!(agg.missing_items, 1);
        // Averages are over the two scored items only.
        assert_eq!(agg.avg_accuracy, 88.0);
        assert_eq!(agg.total_score, 88.75);
    }

    #[test]
    fn test_aggregate_empty_scores_fall_back_to_zero() {
        let items = vec![item(false, None), item(false, None)];
        let agg = aggregate(&items);
        assert_eq!(agg.completed_items, 0);
        assert_eq!(agg.avg_accuracy, 0.0);
        assert_eq!(agg.total_score, 0.0);
    }

    #[test]
    fn test_assignment_feedback_begins_with_completion_clause() {
        let items = vec![
            item(false, None),
            item(true, Some((88.0, 85.0, 92.0, 90.0))),
            item(false, None),
        ];
        let text = assignment_feedback(&aggregate(&items));
        assert!(text.starts_with("完成了 1/3 題"), "got: {}", text);
        assert!(text.contains("整體表現良好"));
        // 92 and 90 and 88 and 85 are all >= 85.
        assert!(text.contains("表現突出"));
    }

    #[test]
    fn test_assignment_feedback_zero_completion() {
        let items = vec![item(false, None), item(false, None), item(false, None)];
        let text = assignment_feedback(&aggregate(&items));
        assert!(text.starts_with("完成了 0/3 題"));
        // No dimension detail when nothing was recorded.
        assert!(!text.contains("表現突出"));
        assert!(!text.contains("整體表現"));
    }

    #[test]
    fn test_assignment_feedback_flags_weak_dimensions() {
        let items = vec![item(true, Some((95.0, 60.0, 75.0, 65.0)))];
        let text = assignment_feedback(&aggregate(&items));
        assert!(text.contains("其中準確度表現突出"));
        assert!(text.contains("流暢度、完整度仍需多加練習"));
    }
}
