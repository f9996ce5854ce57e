use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use engine::Vec3;
use roxmltree::{Document, Node};
use tracing::info;

use crate::gameplay::HackableKind;

use super::hashing::level_fingerprint;
use super::level::{
    AgentDef, BoxDef, HackableDef, LevelDef, PanelAction, PanelDef, PlayerDef, RoomDef,
    ScriptedAction, ShieldDef, TimelineEntry, ViewDef, WaypointDef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownAttribute,
    MissingAttribute,
    MissingElement,
    DuplicateElement,
    DuplicateId,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct LevelError {
    pub code: LevelErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for LevelError {}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLevel {
    pub level: LevelDef,
    pub fingerprint: String,
}

pub fn compile_level(path: &Path) -> Result<CompiledLevel, LevelError> {
    let raw = fs::read_to_string(path).map_err(|source| LevelError {
        code: LevelErrorCode::ReadFile,
        message: format!("failed to read level file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    let level = parse_level(path, &raw)?;
    let fingerprint = level_fingerprint(&raw);
    info!(
        path = %path.display(),
        level = %level.name,
        hackables = level.hackables.len(),
        panels = level.panels.len(),
        timeline = level.timeline.len(),
        "level_compiled"
    );
    Ok(CompiledLevel { level, fingerprint })
}

pub fn parse_level(file_path: &Path, raw: &str) -> Result<LevelDef, LevelError> {
    let doc = Document::parse(raw).map_err(|error| LevelError {
        code: LevelErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    LevelParser {
        file_path,
        doc: &doc,
    }
    .parse()
}

struct LevelParser<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> LevelParser<'a, 'input> {
    fn parse(&self) -> Result<LevelDef, LevelError> {
        let root = self.doc.root_element();
        if root.tag_name().name() != "Level" {
            return Err(self.error(
                LevelErrorCode::InvalidRoot,
                "root element must be <Level>".to_string(),
                root,
            ));
        }
        self.check_attributes(root, &["name", "checkpoint"])?;
        let name = self.required(root, "name")?.to_string();
        let checkpoint = self.parsed::<u32>(root, "checkpoint")?.unwrap_or(0);

        let mut player: Option<PlayerDef> = None;
        let mut walls = Vec::new();
        let mut rooms = Vec::new();
        let mut hackables = Vec::<HackableDef>::new();
        let mut panels = Vec::<PanelDef>::new();
        let mut timeline: Option<Vec<TimelineEntry>> = None;
        let mut hackable_keys = HashSet::<String>::new();
        let mut panel_keys = HashSet::<String>::new();

        for child in root.children().filter(|node| node.is_element()) {
            match child.tag_name().name() {
                "Player" => {
                    if player.is_some() {
                        return Err(self.duplicate_element(child));
                    }
                    player = Some(self.parse_player(child)?);
                }
                "Wall" => {
                    self.check_attributes(child, &["center", "halfExtents"])?;
                    walls.push(self.parse_box(child)?);
                }
                "Room" => {
                    self.check_attributes(child, &["name", "center", "halfExtents"])?;
                    rooms.push(RoomDef {
                        name: self.required(child, "name")?.to_string(),
                        bounds: self.parse_box(child)?,
                    });
                }
                "Camera" => {
                    let camera = self.parse_hackable(child, HackableKind::Camera)?;
                    self.claim_key(&mut hackable_keys, &camera.key, child)?;
                    hackables.push(camera);
                }
                "Agent" => {
                    let agent = self.parse_hackable(child, HackableKind::Agent)?;
                    self.claim_key(&mut hackable_keys, &agent.key, child)?;
                    hackables.push(agent);
                }
                "Panel" => {
                    let panel = self.parse_panel(child)?;
                    self.claim_key(&mut panel_keys, &panel.key, child)?;
                    panels.push(panel);
                }
                "Timeline" => {
                    if timeline.is_some() {
                        return Err(self.duplicate_element(child));
                    }
                    timeline = Some(self.parse_timeline(child)?);
                }
                other => {
                    return Err(self.error(
                        LevelErrorCode::UnknownElement,
                        format!("unknown element <{other}> in <Level>"),
                        child,
                    ))
                }
            }
        }

        let Some(player) = player else {
            return Err(self.error(
                LevelErrorCode::MissingElement,
                "missing required element <Player> in <Level>".to_string(),
                root,
            ));
        };

        let mut timeline = timeline.unwrap_or_default();
        timeline.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));

        Ok(LevelDef {
            name,
            checkpoint,
            player,
            walls,
            rooms,
            hackables,
            panels,
            timeline,
        })
    }

    fn parse_player(&self, node: Node<'_, '_>) -> Result<PlayerDef, LevelError> {
        self.check_attributes(node, &["position", "yaw"])?;
        let mut route = Vec::new();
        for step in node.children().filter(|child| child.is_element()) {
            if step.tag_name().name() != "Step" {
                return Err(self.unknown_child(step, "Player"));
            }
            self.check_attributes(step, &["position"])?;
            route.push(self.required_vec3(step, "position")?);
        }
        Ok(PlayerDef {
            position: self.required_vec3(node, "position")?,
            yaw_degrees: self.finite(node, "yaw")?.unwrap_or(0.0),
            route,
        })
    }

    fn parse_box(&self, node: Node<'_, '_>) -> Result<BoxDef, LevelError> {
        let half_extents = self.required_vec3(node, "halfExtents")?;
        if half_extents.x < 0.0 || half_extents.y < 0.0 || half_extents.z < 0.0 {
            return Err(self.error(
                LevelErrorCode::InvalidValue,
                "halfExtents must be >= 0 on every axis".to_string(),
                node,
            ));
        }
        Ok(BoxDef {
            center: self.required_vec3(node, "center")?,
            half_extents,
        })
    }

    fn parse_hackable(
        &self,
        node: Node<'_, '_>,
        kind: HackableKind,
    ) -> Result<HackableDef, LevelError> {
        const COMMON: [&str; 7] = [
            "id",
            "name",
            "color",
            "room",
            "position",
            "yaw",
            "canHaveMemory",
        ];
        const AGENT_ONLY: [&str; 6] = [
            "patrol",
            "idleLookAround",
            "canChase",
            "idleDuration",
            "minStealthPercent",
            "alarm",
        ];
        let allowed: Vec<&str> = match kind {
            HackableKind::Camera => COMMON.to_vec(),
            HackableKind::Agent => COMMON.iter().chain(AGENT_ONLY.iter()).copied().collect(),
        };
        self.check_attributes(node, &allowed)?;
        let element = node.tag_name().name();

        let mut view: Option<ViewDef> = None;
        let mut shields = Vec::new();
        let mut waypoints = Vec::new();
        for child in node.children().filter(|child| child.is_element()) {
            match child.tag_name().name() {
                "View" => {
                    if view.is_some() {
                        return Err(self.duplicate_element(child));
                    }
                    self.check_attributes(child, &["fov", "range", "eyeHeight"])?;
                    view = Some(ViewDef {
                        fov_degrees: self.finite(child, "fov")?,
                        range: self.finite(child, "range")?,
                        eye_height: self.finite(child, "eyeHeight")?,
                    });
                }
                "Shield" => {
                    self.check_attributes(child, &["color", "disabled"])?;
                    shields.push(ShieldDef {
                        color: self.required_parsed(child, "color")?,
                        disabled: self.flag(child, "disabled")?.unwrap_or(false),
                    });
                }
                "Waypoint" if kind == HackableKind::Agent => {
                    self.check_attributes(
                        child,
                        &["position", "yaw", "randomiseIdle", "alwaysIdle"],
                    )?;
                    waypoints.push(WaypointDef {
                        position: self.required_vec3(child, "position")?,
                        yaw_degrees: self.finite(child, "yaw")?.unwrap_or(0.0),
                        randomise_idle: self.flag(child, "randomiseIdle")?.unwrap_or(false),
                        always_idle: self.flag(child, "alwaysIdle")?.unwrap_or(false),
                    });
                }
                _ => return Err(self.unknown_child(child, element)),
            }
        }

        let position = self.required_vec3(node, "position")?;
        let agent = match kind {
            HackableKind::Camera => None,
            HackableKind::Agent => {
                let min_stealth_percent = self.finite(node, "minStealthPercent")?;
                if min_stealth_percent.is_some_and(|value| !(0.0..=1.0).contains(&value)) {
                    return Err(self.error(
                        LevelErrorCode::InvalidValue,
                        "minStealthPercent must be within 0..=1".to_string(),
                        node,
                    ));
                }
                Some(AgentDef {
                    patrol: self.flag(node, "patrol")?.unwrap_or(true),
                    idle_look_around: self.flag(node, "idleLookAround")?.unwrap_or(true),
                    can_chase: self.flag(node, "canChase")?.unwrap_or(true),
                    idle_duration_seconds: self.finite(node, "idleDuration")?,
                    min_stealth_percent,
                    alarm_position: self.vec3(node, "alarm")?.unwrap_or(position),
                    waypoints,
                })
            }
        };

        Ok(HackableDef {
            key: self.required(node, "id")?.to_string(),
            name: self.required(node, "name")?.to_string(),
            kind,
            color: self.parsed(node, "color")?.unwrap_or_default(),
            room: node.attribute("room").unwrap_or_default().to_string(),
            position,
            yaw_degrees: self.finite(node, "yaw")?.unwrap_or(0.0),
            view,
            can_have_memory: self.flag(node, "canHaveMemory")?.unwrap_or(false),
            shields,
            agent,
        })
    }

    fn parse_panel(&self, node: Node<'_, '_>) -> Result<PanelDef, LevelError> {
        self.check_attributes(node, &["id", "color", "action", "enabled", "targets"])?;
        if let Some(child) = node.children().find(|child| child.is_element()) {
            return Err(self.unknown_child(child, "Panel"));
        }
        let targets: Vec<String> = self
            .required(node, "targets")?
            .split(',')
            .map(str::trim)
            .filter(|target| !target.is_empty())
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            return Err(self.error(
                LevelErrorCode::InvalidValue,
                "panel targets must name at least one hackable".to_string(),
                node,
            ));
        }
        Ok(PanelDef {
            key: self.required(node, "id")?.to_string(),
            color: self.required_parsed(node, "color")?,
            action: self.parsed(node, "action")?.unwrap_or(PanelAction::Both),
            enabled: self.flag(node, "enabled")?.unwrap_or(true),
            targets,
        })
    }

    fn parse_timeline(&self, node: Node<'_, '_>) -> Result<Vec<TimelineEntry>, LevelError> {
        self.check_attributes(node, &[])?;
        let mut entries = Vec::new();
        for entry in node.children().filter(|child| child.is_element()) {
            if entry.tag_name().name() != "At" {
                return Err(self.unknown_child(entry, "Timeline"));
            }
            self.check_attributes(entry, &["seconds", "action", "target", "panel"])?;
            let at_seconds = self.required_finite(entry, "seconds")?;
            if at_seconds < 0.0 {
                return Err(self.error(
                    LevelErrorCode::InvalidValue,
                    "seconds must be >= 0".to_string(),
                    entry,
                ));
            }
            let action = match self.required(entry, "action")? {
                "hack" => ScriptedAction::Hack {
                    target: self.required(entry, "target")?.to_string(),
                },
                "unhack" => ScriptedAction::Unhack,
                "wipe" => ScriptedAction::Wipe {
                    target: self.required(entry, "target")?.to_string(),
                },
                "panel" => ScriptedAction::Panel {
                    panel: self.required(entry, "panel")?.to_string(),
                },
                "alarm" => ScriptedAction::Alarm,
                "clear_alarm" => ScriptedAction::ClearAlarm,
                "checkpoint" => ScriptedAction::Checkpoint,
                "pause" => ScriptedAction::Pause,
                "resume" => ScriptedAction::Resume,
                other => {
                    return Err(self.error(
                        LevelErrorCode::InvalidValue,
                        format!(
                            "unknown action '{other}'; allowed values: hack, unhack, wipe, panel, alarm, clear_alarm, checkpoint, pause, resume"
                        ),
                        entry,
                    ))
                }
            };
            entries.push(TimelineEntry { at_seconds, action });
        }
        Ok(entries)
    }

    fn claim_key(
        &self,
        seen: &mut HashSet<String>,
        key: &str,
        node: Node<'_, '_>,
    ) -> Result<(), LevelError> {
        if seen.insert(key.to_string()) {
            return Ok(());
        }
        Err(self.error(
            LevelErrorCode::DuplicateId,
            format!("duplicate id '{key}' on <{}>", node.tag_name().name()),
            node,
        ))
    }

    fn check_attributes(&self, node: Node<'_, '_>, allowed: &[&str]) -> Result<(), LevelError> {
        for attribute in node.attributes() {
            if !allowed.contains(&attribute.name()) {
                return Err(self.error(
                    LevelErrorCode::UnknownAttribute,
                    format!(
                        "unknown attribute '{}' on <{}>",
                        attribute.name(),
                        node.tag_name().name()
                    ),
                    node,
                ));
            }
        }
        Ok(())
    }

    fn required<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, LevelError> {
        match node.attribute(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(self.error(
                LevelErrorCode::MissingAttribute,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    fn parsed<T>(&self, node: Node<'_, '_>, name: &str) -> Result<Option<T>, LevelError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        raw.trim().parse::<T>().map(Some).map_err(|error| {
            self.error(
                LevelErrorCode::InvalidValue,
                format!("invalid {name} '{raw}': {error}"),
                node,
            )
        })
    }

    fn required_parsed<T>(&self, node: Node<'_, '_>, name: &str) -> Result<T, LevelError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.required(node, name)?;
        self.parsed(node, name)?
            .ok_or_else(|| self.missing(node, name))
    }

    fn finite(&self, node: Node<'_, '_>, name: &str) -> Result<Option<f32>, LevelError> {
        let value = self.parsed::<f32>(node, name)?;
        if value.is_some_and(|value| !value.is_finite()) {
            return Err(self.error(
                LevelErrorCode::InvalidValue,
                format!("{name} must be a finite number"),
                node,
            ));
        }
        Ok(value)
    }

    fn required_finite(&self, node: Node<'_, '_>, name: &str) -> Result<f32, LevelError> {
        self.finite(node, name)?
            .ok_or_else(|| self.missing(node, name))
    }

    fn flag(&self, node: Node<'_, '_>, name: &str) -> Result<Option<bool>, LevelError> {
        self.parsed::<bool>(node, name)
    }

    fn vec3(&self, node: Node<'_, '_>, name: &str) -> Result<Option<Vec3>, LevelError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        let parts: Vec<Option<f32>> = raw
            .split(',')
            .map(|part| part.trim().parse::<f32>().ok().filter(|value| value.is_finite()))
            .collect();
        match parts.as_slice() {
            [Some(x), Some(y), Some(z)] => Ok(Some(Vec3::new(*x, *y, *z))),
            _ => Err(self.error(
                LevelErrorCode::InvalidValue,
                format!("{name} '{raw}' must be three finite numbers 'x,y,z'"),
                node,
            )),
        }
    }

    fn required_vec3(&self, node: Node<'_, '_>, name: &str) -> Result<Vec3, LevelError> {
        self.vec3(node, name)?
            .ok_or_else(|| self.missing(node, name))
    }

    fn missing(&self, node: Node<'_, '_>, name: &str) -> LevelError {
        self.error(
            LevelErrorCode::MissingAttribute,
            format!(
                "missing required attribute '{name}' on <{}>",
                node.tag_name().name()
            ),
            node,
        )
    }

    fn unknown_child(&self, child: Node<'_, '_>, parent: &str) -> LevelError {
        self.error(
            LevelErrorCode::UnknownElement,
            format!("unknown element <{}> in <{parent}>", child.tag_name().name()),
            child,
        )
    }

    fn duplicate_element(&self, node: Node<'_, '_>) -> LevelError {
        self.error(
            LevelErrorCode::DuplicateElement,
            format!("element <{}> may appear only once", node.tag_name().name()),
            node,
        )
    }

    fn error(&self, code: LevelErrorCode, message: String, node: Node<'_, '_>) -> LevelError {
        let pos = self.doc.text_pos_at(node.range().start);
        LevelError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}
