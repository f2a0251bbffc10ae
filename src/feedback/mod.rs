//! Fixed coaching texts keyed by predicted scores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::schema::{ScoreVector, Target};

/// Score at or below which a target gets a recommendation.
pub const RECOMMENDATION_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub overall_assessment: &'static str,
    pub detailed_scores: BTreeMap<Target, DetailedScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetailedScore {
    pub score: u8,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub category: &'static str,
    pub issue: &'static str,
    pub suggestion: &'static str,
}

struct Advice {
    target: Target,
    descriptions: [&'static str; 5],
    recommendation: Recommendation,
}

const ADVICE: [Advice; 7] = [
    Advice {
        target: Target::SpeechPace,
        descriptions: [
            "Too slow - consider increasing your speaking rate",
            "Somewhat slow - try to pick up the pace slightly",
            "Adequate pace - could be improved",
            "Good pace - easy to follow",
            "Excellent pace - perfectly balanced",
        ],
        recommendation: Recommendation {
            category: "Speech Pace",
            issue: "Pacing needs improvement",
            suggestion: "Practice speaking at a consistent rate of 140-160 words per minute. Use a timer during practice.",
        },
    },
    Advice {
        target: Target::PausingFluency,
        descriptions: [
            "Poor pausing - work on strategic pauses",
            "Below average fluency - practice smoother transitions",
            "Adequate pausing - room for improvement",
            "Good use of pauses - natural flow",
            "Excellent fluency - masterful use of pauses",
        ],
        recommendation: Recommendation {
            category: "Pausing & Fluency",
            issue: "Inconsistent pausing",
            suggestion: "Use strategic pauses after key points. Pause for 1-2 seconds between major ideas.",
        },
    },
    Advice {
        target: Target::LoudnessControl,
        descriptions: [
            "Poor volume control - work on projection",
            "Inconsistent volume - practice control",
            "Adequate volume - could be more dynamic",
            "Good volume control - well modulated",
            "Excellent volume control - perfect projection",
        ],
        recommendation: Recommendation {
            category: "Volume Control",
            issue: "Volume inconsistency",
            suggestion: "Practice projecting from your diaphragm. Vary volume for emphasis but maintain audibility.",
        },
    },
    Advice {
        target: Target::PitchVariation,
        descriptions: [
            "Monotonous - add vocal variety",
            "Limited variation - practice intonation",
            "Some variation - could be more expressive",
            "Good pitch variation - engaging delivery",
            "Excellent vocal variety - very expressive",
        ],
        recommendation: Recommendation {
            category: "Pitch Variation",
            issue: "Limited vocal variety",
            suggestion: "Practice varying your pitch to emphasize key words. Avoid monotone delivery.",
        },
    },
    Advice {
        target: Target::ArticulationClarity,
        descriptions: [
            "Poor articulation - focus on clarity",
            "Unclear at times - improve enunciation",
            "Generally clear - some improvement needed",
            "Clear articulation - easy to understand",
            "Excellent clarity - perfectly articulated",
        ],
        recommendation: Recommendation {
            category: "Articulation",
            issue: "Clarity needs work",
            suggestion: "Practice tongue twisters and enunciate consonants clearly. Slow down if needed for clarity.",
        },
    },
    Advice {
        target: Target::ExpressiveEmphasis,
        descriptions: [
            "Lacks expression - work on emphasis",
            "Limited expression - add more emotion",
            "Some expression - could be more impactful",
            "Good expression - engaging delivery",
            "Highly expressive - captivating emphasis",
        ],
        recommendation: Recommendation {
            category: "Expression",
            issue: "Lacks emotional impact",
            suggestion: "Connect emotionally with your content. Use vocal variety to convey passion and conviction.",
        },
    },
    Advice {
        target: Target::FillerWords,
        descriptions: [
            "Excessive fillers - significant improvement needed",
            "Too many fillers - practice reducing them",
            "Some fillers present - work on elimination",
            "Few fillers - minimal distraction",
            "No fillers - clean, professional delivery",
        ],
        recommendation: Recommendation {
            category: "Filler Words",
            issue: "Too many filler words",
            suggestion: "Practice pausing instead of using \"um\", \"uh\", \"like\". Record yourself to identify patterns.",
        },
    },
];

const ASSESSMENTS: [&str; 5] = [
    "Needs significant improvement - Focus on fundamentals",
    "Below average - Practice key speaking techniques",
    "Average performance - Room for growth",
    "Good performance - Strong speaking skills",
    "Excellent performance - Outstanding speaker",
];

const STRONG_OVERALL: Recommendation = Recommendation {
    category: "Overall",
    issue: "Strong performance",
    suggestion: "Great job! Continue refining your skills with regular practice and seek diverse speaking opportunities.",
};

const WEAK_OVERALL: Recommendation = Recommendation {
    category: "Overall",
    issue: "Needs significant improvement",
    suggestion: "Focus on fundamentals: clear articulation, consistent pacing, and regular practice. Consider joining a public speaking group.",
};

fn band(score: u8) -> usize {
    usize::from(score.clamp(1, 5) - 1)
}

pub fn overall_assessment(score: u8) -> &'static str {
    ASSESSMENTS[band(score)]
}

/// Description of `score` for `target`; `None` for [`Target::Overall`].
pub fn describe(target: Target, score: u8) -> Option<&'static str> {
    ADVICE
        .iter()
        .find(|advice| advice.target == target)
        .map(|advice| advice.descriptions[band(score)])
}

pub fn feedback(scores: &ScoreVector) -> Feedback {
    let detailed_scores = ADVICE
        .iter()
        .map(|advice| {
            let score = scores.get(advice.target);
            (
                advice.target,
                DetailedScore {
                    score,
                    description: advice.descriptions[band(score)],
                },
            )
        })
        .collect();
    Feedback {
        overall_assessment: overall_assessment(scores.get(Target::Overall)),
        detailed_scores,
    }
}

/// One entry per weak target in column order, then a closing note driven by `overall`.
pub fn recommendations(scores: &ScoreVector) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = ADVICE
        .iter()
        .filter(|advice| scores.get(advice.target) <= RECOMMENDATION_THRESHOLD)
        .map(|advice| advice.recommendation)
        .collect();
    match scores.get(Target::Overall) {
        overall if overall >= 4 => out.push(STRONG_OVERALL),
        overall if overall <= 2 => out.push(WEAK_OVERALL),
        _ => {}
    }
    out
}
