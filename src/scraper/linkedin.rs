//! LinkedIn URLs and element locators.

pub const HOME_URL: &str = "https://www.linkedin.com";

/// Search results per page; the `start` parameter advances by this much.
pub const RESULTS_PER_PAGE: u64 = 25;

// Sign-in form on the home page.
pub const SESSION_KEY_INPUT: &str = "//input[@id='session_key']";
pub const SESSION_PASSWORD_INPUT: &str = "//input[@id='session_password']";
pub const SIGN_IN_SUBMIT: &str = "//button[contains(@data-id,'sign-in-form__submit-btn')]";

// Search results.
pub const NO_MATCHING_JOBS: &str = "//h1[text()[contains(.,'No matching jobs found.')]]";
pub const JOB_CARD_LINKS: &str = "//div[contains(@class, 'job-card-container')]//a";

// Job page.
pub const EXPIRED_ALERT: &str = "//div[contains(@role,'alert')]";
pub const JOB_TITLE: &str = "//h1";
pub const PRIMARY_DESCRIPTION: &str =
    "//div[contains(@class,'job-details-jobs-unified-top-card__primary-description-container')]";
pub const APPLY_BUTTON: &str = "//button[contains(@class,'jobs-apply-button')]";
pub const APPLY_BUTTON_TEXT: &str = "Apply";

// Skills dialog.
pub const SHOW_SKILLS: &str =
    "//span[text()[contains(.,'Show all skills') or contains(.,'Show qualification details')]]";
pub const SKILL_LIST: &str = "//ul[contains(@class,'job-details-skill-match-status-list')]";
pub const SKILL_ITEMS: &str = "//ul[contains(@class,'job-details-skill-match-status-list')]//li";
pub const SKILLS_DONE: &str = "//span[text()[contains(.,'Done')]]";
