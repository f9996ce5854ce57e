use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorTag {
    #[default]
    None,
    Red,
    Blue,
    Yellow,
    Green,
}

impl ColorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorTag {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            other => Err(format!(
                "unknown color '{other}'; allowed values: none, red, blue, yellow, green"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HackableKind {
    Camera,
    Agent,
}

/// Position of a hackable in level order; doubles as its persistence index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HackableId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HackAction {
    Hack,
    WipeMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderGroup {
    Interactable,
    CulledWhileHacked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Tinted(ColorTag),
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parse_is_case_insensitive() {
        assert_eq!("Blue".parse::<ColorTag>(), Ok(ColorTag::Blue));
        assert_eq!(" green ".parse::<ColorTag>(), Ok(ColorTag::Green));
        assert_eq!("".parse::<ColorTag>(), Ok(ColorTag::None));
        assert!("purple".parse::<ColorTag>().is_err());
    }
}
