//! User-Agent classification
//!
//! Turns a raw User-Agent header into a closed set of browser, OS and device
//! buckets. Anything the parser cannot identify lands in an explicit
//! `Unknown` bucket; unclassifiable devices count as desktop.

use serde::{Deserialize, Serialize};
use std::fmt;
use woothee::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
    InternetExplorer,
    Vivaldi,
    Yandex,
    /// Identified by the parser but outside the tracked set (crawlers, niche browsers)
    Other,
    Unknown,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Edge => "Edge",
            Browser::Opera => "Opera",
            Browser::InternetExplorer => "Internet Explorer",
            Browser::Vivaldi => "Vivaldi",
            Browser::Yandex => "Yandex",
            Browser::Other => "Other",
            Browser::Unknown => "Unknown",
        }
    }

    fn from_parser_name(name: &str) -> Self {
        match name {
            "" | "UNKNOWN" => Browser::Unknown,
            "Chrome" => Browser::Chrome,
            "Firefox" => Browser::Firefox,
            "Safari" => Browser::Safari,
            "Edge" => Browser::Edge,
            "Opera" => Browser::Opera,
            "Internet Explorer" => Browser::InternetExplorer,
            "Vivaldi" => Browser::Vivaldi,
            "Yandex Browser" => Browser::Yandex,
            _ => Browser::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    Windows,
    MacOs,
    Ios,
    Android,
    Linux,
    ChromeOs,
    Other,
    Unknown,
}

impl OperatingSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingSystem::Windows => "Windows",
            OperatingSystem::MacOs => "macOS",
            OperatingSystem::Ios => "iOS",
            OperatingSystem::Android => "Android",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::ChromeOs => "ChromeOS",
            OperatingSystem::Other => "Other",
            OperatingSystem::Unknown => "Unknown",
        }
    }

    fn from_parser_name(name: &str) -> Self {
        if name.is_empty() || name == "UNKNOWN" {
            return OperatingSystem::Unknown;
        }

        let lower = name.to_lowercase();
        if lower.starts_with("windows") {
            OperatingSystem::Windows
        } else if lower.starts_with("mac os") {
            OperatingSystem::MacOs
        } else if matches!(lower.as_str(), "iphone" | "ipad" | "ipod" | "ios") {
            OperatingSystem::Ios
        } else if lower.starts_with("android") {
            OperatingSystem::Android
        } else if lower.starts_with("chromeos") || lower.starts_with("chrome os") {
            OperatingSystem::ChromeOs
        } else if lower.starts_with("linux") {
            OperatingSystem::Linux
        } else {
            OperatingSystem::Other
        }
    }
}

/// Device class. There is no unknown bucket: unclassified traffic is desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
    Console,
    Bot,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Console => "console",
            DeviceType::Bot => "bot",
        }
    }

    fn from_parser_category(category: &str, raw: &str) -> Self {
        match category {
            "smartphone" | "mobilephone" if is_tablet(raw) => DeviceType::Tablet,
            "smartphone" | "mobilephone" => DeviceType::Mobile,
            "appliance" => DeviceType::Console,
            "crawler" => DeviceType::Bot,
            _ => DeviceType::Desktop,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Browser, OperatingSystem, DeviceType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentInfo {
    pub browser: Browser,
    pub os: OperatingSystem,
    pub device: DeviceType,
}

impl UserAgentInfo {
    pub const UNKNOWN: UserAgentInfo = UserAgentInfo {
        browser: Browser::Unknown,
        os: OperatingSystem::Unknown,
        device: DeviceType::Desktop,
    };
}

fn is_tablet(raw: &str) -> bool {
    raw.contains("iPad") || (raw.contains("Android") && !raw.contains("Mobile"))
}

fn is_chromium_edge(raw: &str) -> bool {
    raw.contains("Edg/") || raw.contains("EdgA/") || raw.contains("EdgiOS/")
}

/// Classify a raw User-Agent header value.
pub fn classify_user_agent(raw: &str) -> UserAgentInfo {
    let raw = raw.trim();
    if raw.is_empty() {
        return UserAgentInfo::UNKNOWN;
    }

    let Some(result) = Parser::new().parse(raw) else {
        return UserAgentInfo::UNKNOWN;
    };

    let browser = if is_chromium_edge(raw) {
        Browser::Edge
    } else {
        Browser::from_parser_name(&result.name)
    };

    UserAgentInfo {
        browser,
        os: OperatingSystem::from_parser_name(&result.os),
        device: DeviceType::from_parser_category(&result.category, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_classify_desktop_chrome() {
        let info = classify_user_agent(CHROME_WINDOWS);
        assert_eq!(info.browser, Browser::Chrome);
        assert_eq!(info.os, OperatingSystem::Windows);
        assert_eq!(info.device, DeviceType::Desktop);
    }

    #[test]
    fn test_classify_firefox_linux() {
        let info = classify_user_agent(FIREFOX_LINUX);
        assert_eq!(info.browser, Browser::Firefox);
        assert_eq!(info.os, OperatingSystem::Linux);
        assert_eq!(info.device, DeviceType::Desktop);
    }

    #[test]
    fn test_classify_iphone_is_mobile() {
        let info = classify_user_agent(SAFARI_IPHONE);
        assert_eq!(info.browser, Browser::Safari);
        assert_eq!(info.os, OperatingSystem::Ios);
        assert_eq!(info.device, DeviceType::Mobile);
    }

    #[test]
    fn test_classify_ipad_is_tablet() {
        let info = classify_user_agent(SAFARI_IPAD);
        assert_eq!(info.os, OperatingSystem::Ios);
        assert_eq!(info.device, DeviceType::Tablet);
    }

    #[test]
    fn test_classify_chromium_edge() {
        assert_eq!(classify_user_agent(EDGE_WINDOWS).browser, Browser::Edge);
    }

    #[test]
    fn test_classify_crawler() {
        let info = classify_user_agent(GOOGLEBOT);
        assert_eq!(info.device, DeviceType::Bot);
        assert_eq!(info.browser, Browser::Other);
    }

    #[test]
    fn test_empty_user_agent_defaults_to_desktop() {
        assert_eq!(classify_user_agent(""), UserAgentInfo::UNKNOWN);
        assert_eq!(classify_user_agent("   "), UserAgentInfo::UNKNOWN);
        assert_eq!(UserAgentInfo::UNKNOWN.device.as_str(), "desktop");
        assert_eq!(UserAgentInfo::UNKNOWN.browser.as_str(), "Unknown");
    }

    #[test]
    fn test_unrecognised_user_agent_defaults_to_desktop() {
        let info = classify_user_agent("definitely-not-a-browser");
        assert_eq!(info.device, DeviceType::Desktop);
    }

    #[test]
    fn test_display_matches_keys() {
        assert_eq!(Browser::InternetExplorer.to_string(), "Internet Explorer");
        assert_eq!(OperatingSystem::MacOs.to_string(), "macOS");
        assert_eq!(DeviceType::Tablet.to_string(), "tablet");
    }
}
