// Selector table for the job board UI.
// The engine's decision logic never inspects these strings; they are data.

pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const USERNAME_INPUT: &str = "#username";
pub const PASSWORD_INPUT: &str = "#password";
pub const LOGIN_SUBMIT: &str = "button[type='submit']";

pub const JOB_CARD: &str = ".job-card-container";
pub const JOB_CARD_LINK: &str = "a";
pub const APPLY_BUTTON: &str = ".jobs-apply-button";
pub const MODAL: &str = ".artdeco-modal";

pub const TEXT_INPUTS: &str = "input[type='text'], textarea";
pub const DROPDOWNS: &str = "select";
pub const DROPDOWN_OPTIONS: &str = "option";
pub const RADIOS: &str = "input[type='radio']";
pub const CHECKBOXES: &str = "input[type='checkbox']";
pub const FEEDBACK: &str = ".artdeco-inline-feedback__message";
pub const BUTTONS: &str = "button";

pub const PHONE_INPUT: &str = "input[id*='phone']";
pub const ZIP_INPUT: &str = "input[id*='zip']";

/// XPath, relative to a control.
pub const PRECEDING_LABEL: &str = "./preceding::label[1]";
pub const PRECEDING_LEGEND: &str = "./preceding::legend[1]";
pub const FOLLOWING_LABEL: &str = "./following-sibling::label[1]";

/// Tried in order; the first visible, enabled, not-disabled match is clicked.
pub const NEXT_PAGE_BUTTONS: &[&str] = &[
    "button[aria-label*='Next' i]",
    "button[aria-label*='next page' i]",
    "li.artdeco-pagination__indicator--number.active + li button",
    "button.artdeco-pagination__button--next",
    "[data-test-pagination-next]",
];

/// Placeholder option text that never counts as a selection.
pub const PLACEHOLDER_OPTION: &str = "select an option";

/// Escape in the WebDriver key code space.
pub const ESCAPE_KEY: &str = "\u{E00C}";
