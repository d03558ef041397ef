//! Line-oriented console input. Each line maps onto one [`UserInput`].

use anyhow::{anyhow, bail, Result};
use preview_core::{Background, SliderControl, UserInput};
use shared::{
    protocol::{ControlCommand, MotionRequest},
    settings::{DefaultBackground, RenderQuality, SettingToggle},
};

pub const HELP: &str = "\
commands:
  x <px> | y <px> | scale <percent> | rotate <deg> | opacity <percent>
  fit | reset | clear | tap | reconnect | resize | show
  load <model.json> | expression <name> | motion <group> [index]
  resolution <auto|WxH> | bg <transparent|tint|#rrggbb> | default-bg <transparent|custom>
  set <autoFit|showInfo|antialias|debug|wsReconnect> <on|off>
  quality <low|medium|high> | language <code> | quit";

fn on_off(raw: &str) -> Result<bool> {
    match raw {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("expected on/off, got {other:?}"),
    }
}

fn arg<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    let rest = rest.trim();
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest)
}

fn slider(control: SliderControl, rest: &str, usage: &str) -> Result<UserInput> {
    Ok(UserInput::Slider {
        control,
        raw: arg(rest, usage)?.to_string(),
    })
}

/// `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<UserInput>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    let input = match verb {
        "x" => slider(SliderControl::PositionX, rest, "x <px>")?,
        "y" => slider(SliderControl::PositionY, rest, "y <px>")?,
        "scale" => slider(SliderControl::Scale, rest, "scale <percent>")?,
        "rotate" => slider(SliderControl::Rotation, rest, "rotate <deg>")?,
        "opacity" => slider(SliderControl::Opacity, rest, "opacity <percent>")?,
        "fit" => UserInput::AutoFit,
        "reset" => UserInput::ResetTransform,
        "clear" => UserInput::ClearModel,
        "tap" => UserInput::PointerDown,
        "reconnect" => UserInput::Reconnect,
        "resize" => UserInput::ContainerResized,
        "show" => UserInput::ViewActivated,
        "load" => UserInput::Command(ControlCommand::load(arg(rest, "load <model.json>")?)),
        "expression" => {
            UserInput::SelectExpression(arg(rest, "expression <name>")?.to_string())
        }
        "motion" => {
            let rest = arg(rest, "motion <group> [index]")?;
            let request = match rest.rsplit_once(char::is_whitespace) {
                Some((group, index)) => match index.trim().parse::<i64>() {
                    Ok(index) => MotionRequest::Indexed {
                        motion: group.trim().to_string(),
                        index: Some(index),
                    },
                    Err(_) => MotionRequest::Group(rest.to_string()),
                },
                None => MotionRequest::Group(rest.to_string()),
            };
            UserInput::PlayMotion(request)
        }
        "resolution" => UserInput::SetResolution(arg(rest, "resolution <auto|WxH>")?.to_string()),
        "bg" => {
            let raw = arg(rest, "bg <transparent|tint|#rrggbb>")?;
            let background = match raw {
                "transparent" => Background::Transparent,
                "tint" => Background::Tinted,
                colour => Background::parse_solid(colour)
                    .ok_or_else(|| anyhow!("invalid colour {colour:?}; expected #rrggbb"))?,
            };
            UserInput::SetBackground(background)
        }
        "default-bg" => {
            let default_bg = match arg(rest, "default-bg <transparent|custom>")? {
                "transparent" => DefaultBackground::Transparent,
                "custom" => DefaultBackground::Custom,
                other => bail!("unknown default background {other:?}"),
            };
            UserInput::SetDefaultBackground(default_bg)
        }
        "set" => {
            let rest = arg(rest, "set <key> <on|off>")?;
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: set <key> <on|off>"))?;
            let toggle = SettingToggle::from_key(key)
                .ok_or_else(|| anyhow!("unknown setting {key:?}"))?;
            UserInput::Toggle {
                toggle,
                value: on_off(value.trim())?,
            }
        }
        "quality" => {
            let quality = match arg(rest, "quality <low|medium|high>")? {
                "low" => RenderQuality::Low,
                "medium" => RenderQuality::Medium,
                "high" => RenderQuality::High,
                other => bail!("unknown quality {other:?}"),
            };
            UserInput::SetQuality(quality)
        }
        "language" => UserInput::SetLanguage(arg(rest, "language <code>")?.to_string()),
        "quit" | "exit" => UserInput::Shutdown,
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(input))
}
