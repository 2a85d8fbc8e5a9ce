// Shared prompt constants.
// Each engine component that needs the model builds its own prompts in engine/prompts.rs.
// This file contains cross-cutting fragments.

/// System prompt used for every form-answer request.
pub const APPLICATION_ASSISTANT_SYSTEM: &str =
    "You are a helpful assistant for job applications.";

/// Appended to free-text prompts so the reply can be typed into a field as-is.
pub const LITERAL_ANSWER_INSTRUCTION: &str = "\
    Provide ONLY the answer (a number for experience questions, Yes/No for yes/no questions, \
    short text for others). No explanation.";

/// Appended to selection prompts so the reply can be matched against the option list.
pub const EXACT_OPTION_INSTRUCTION: &str = "Return ONLY the exact option text, nothing else.";

/// Appended to checkbox prompts.
pub const YES_NO_INSTRUCTION: &str = "Answer 'yes' or 'no' only.";
