use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Top,
    Bottom,
    Dress,
    Outerwear,
    Shoes,
    Accessory,
    #[default]
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Top => write!(f, "top"),
            Category::Bottom => write!(f, "bottom"),
            Category::Dress => write!(f, "dress"),
            Category::Outerwear => write!(f, "outerwear"),
            Category::Shoes => write!(f, "shoes"),
            Category::Accessory => write!(f, "accessory"),
            Category::Other => write!(f, "other"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Category::Top),
            "bottom" => Ok(Category::Bottom),
            "dress" => Ok(Category::Dress),
            "outerwear" => Ok(Category::Outerwear),
            "shoes" => Ok(Category::Shoes),
            "accessory" => Ok(Category::Accessory),
            "other" => Ok(Category::Other),
            _ => Err(format!(
                "Invalid category '{}'. Valid options: top, bottom, dress, outerwear, shoes, accessory, other",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!(Category::from_str("top").unwrap(), Category::Top);
        assert_eq!(Category::from_str("SHOES").unwrap(), Category::Shoes);
        assert_eq!(Category::from_str("Outerwear").unwrap(), Category::Outerwear);
        assert!(Category::from_str("hat").is_err());
        assert!(Category::from_str("").is_err());
    }

    #[test]
    fn test_category_json() {
        let json = serde_json::to_string(&Category::Accessory).unwrap();
        assert_eq!(json, "\"accessory\"");
        assert_eq!(format!("{}", Category::Dress), "dress");
    }
}
