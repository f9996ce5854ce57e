use std::mem;

use super::types::ColorTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldGate {
    color: ColorTag,
    is_disabled: bool,
    /// Whether the shield's visual is drawn; follows the enabled state.
    visible: bool,
}

impl ShieldGate {
    pub fn new(color: ColorTag, is_disabled: bool) -> Self {
        Self {
            color,
            is_disabled,
            visible: !is_disabled,
        }
    }

    pub fn color(&self) -> ColorTag {
        self.color
    }

    pub fn is_disabled(&self) -> bool {
        self.is_disabled
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_enabled(&mut self, enable: bool) {
        self.is_disabled = !enable;
        self.visible = enable;
    }
}

/// The enabled/disabled partition of one hackable's shields. Every gate lives in exactly
/// one of the two lists and its `is_disabled` flag always matches the list it is in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShieldSet {
    enabled: Vec<ShieldGate>,
    disabled: Vec<ShieldGate>,
}

impl ShieldSet {
    pub fn new(shields: impl IntoIterator<Item = ShieldGate>) -> Self {
        let (disabled, enabled) = shields.into_iter().partition(ShieldGate::is_disabled);
        Self { enabled, disabled }
    }

    pub fn has_no_shields(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }

    pub fn enabled(&self) -> &[ShieldGate] {
        &self.enabled
    }

    pub fn disabled(&self) -> &[ShieldGate] {
        &self.disabled
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    pub fn len(&self) -> usize {
        self.enabled.len() + self.disabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.has_no_shields()
    }

    /// Moves every gate of `color` out of the opposite list in one batch and returns how
    /// many moved. Relative order inside both lists is preserved.
    pub fn set_color(&mut self, enable: bool, color: ColorTag) -> usize {
        if self.has_no_shields() {
            return 0;
        }

        let (source, target) = if enable {
            (&mut self.disabled, &mut self.enabled)
        } else {
            (&mut self.enabled, &mut self.disabled)
        };

        let (mut moving, staying): (Vec<ShieldGate>, Vec<ShieldGate>) = mem::take(source)
            .into_iter()
            .partition(|shield| shield.color == color);
        *source = staying;

        let moved = moving.len();
        for shield in &mut moving {
            shield.set_enabled(enable);
        }
        target.append(&mut moving);
        moved
    }
}
