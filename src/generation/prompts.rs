//! Prompt text for conversation synthesis.

/// The scripted consultation the model continues.
///
/// The trailing `"Doctor: "` turn is deliberate: it leaves the model
/// mid-dialogue so the continuation stays in the consultation format. The
/// same text serves as the reference transcript for live recordings, where
/// the speaker reads the script aloud.
pub const CONSULTATION_PROMPT: &str = "\
Doctor: What brings you in today?\n\
Patient: I have been experiencing back pain and fatigue.\n\
Doctor: How long have you been dealing with these issues?\n\
Patient: It's been a few weeks now.\n\
Doctor: Have you had any similar issues in the past?\n\
Patient: No, this is the first time.\n\
Doctor: Any significant medical history we should know about?\n\
Patient: I have a history of hypertension.\n\
Doctor: Have you had any surgeries in the past?\n\
Patient: Yes, I had an appendectomy five years ago.\n\
Doctor: Is there any family history of chronic illnesses?\n\
Patient: Yes, my father has diabetes.\n\
Doctor: Do you have any history of addiction?\n\
Patient: No, I don't.\n\
Doctor: How about your diet?\n\
Patient: I try to eat a balanced diet, but I sometimes skip meals due to a busy schedule.\n\
Doctor: How often do you engage in physical activity?\n\
Patient: I try to exercise at least three times a week.\n\
Doctor: How has your stress level been recently?\n\
Patient: It's been quite high due to work pressure.\n\
Doctor: How well are you sleeping?\n\
Patient: I struggle with sleep and often wake up feeling tired.\n\
Doctor: Are you currently on any medication?\n\
Patient: Yes, I'm taking medication for hypertension.\n\
Doctor: ";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_ends_mid_dialogue() {
        assert!(CONSULTATION_PROMPT.ends_with("Doctor: "));
    }

    #[test]
    fn test_prompt_alternates_speakers() {
        let speakers: Vec<&str> = CONSULTATION_PROMPT
            .lines()
            .filter_map(|line| line.split(':').next())
            .collect();

        assert!(speakers.len() > 10);
        for pair in speakers.windows(2) {
            assert_ne!(pair[0], pair[1], "consecutive turns by the same speaker");
        }
    }
}
