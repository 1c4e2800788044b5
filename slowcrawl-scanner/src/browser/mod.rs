pub mod chromium;
pub mod locate;
pub mod webdriver;

pub use chromium::ChromiumSession;
pub use webdriver::WebDriverSession;
