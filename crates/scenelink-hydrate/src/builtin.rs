// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in components.
//!
//! `Scene`, `Background` and `RenderParams` each register one `CAMERA_MOVE`
//! reducer on the uplink store that decorates the outgoing event with part of
//! `value.world`. Their reducers compose: whichever are mounted contribute
//! their field without knowing about the others.
//!
//! | tag | adds |
//! |---|---|
//! | `Scene` | `value.world.position` / `rotation` / `scale` from the matching props |
//! | `Background` | `value.world.background` from the `color` prop |
//! | `RenderParams` | `value.world.render`, a map of every prop |
//! | `Group` | nothing; a plain container |

use scenelink_bus::{ReducerError, RegistrationGuard};
use scenelink_proto::value::set_path;
use scenelink_proto::{etype, Props, UplinkEvent, Value};

use crate::{Component, MountContext, SharedProps};

/// Tag of [`Scene`].
pub const SCENE: &str = "Scene";
/// Tag of [`Background`].
pub const BACKGROUND: &str = "Background";
/// Tag of [`RenderParams`].
pub const RENDER_PARAMS: &str = "RenderParams";
/// Tag of [`Group`].
pub const GROUP: &str = "Group";

const TRANSFORM: [&str; 3] = ["position", "rotation", "scale"];

/// Props plus the registrations made from them.
#[derive(Default)]
struct Attached {
    props: SharedProps,
    guards: Vec<RegistrationGuard>,
}

impl Attached {
    /// Capture props and register a `CAMERA_MOVE` reducer writing into
    /// `value.world` through `decorate`.
    fn mount<F>(&mut self, ctx: &MountContext<'_>, decorate: F)
    where
        F: Fn(&SharedProps, &mut Value) + Send + Sync + 'static,
    {
        self.props.replace(ctx.props);
        let props = self.props.clone();
        let reg = ctx
            .channels
            .uplink
            .add_reducer(etype::CAMERA_MOVE, move |mut e: UplinkEvent| {
                decorate(&props, &mut e.value);
                Ok::<_, ReducerError>(e)
            });
        self.guards.push(reg.into_guard());
    }

    fn unmount(&mut self) {
        self.guards.clear();
    }
}

/// Scene root: attaches the world transform to camera moves.
#[derive(Default)]
pub struct Scene {
    inner: Attached,
}

impl Component for Scene {
    fn mount(&mut self, ctx: &MountContext<'_>) {
        self.inner.mount(ctx, |props, value| {
            for name in TRANSFORM {
                if let Some(v) = props.get(name) {
                    set_path(value, &["world", name], v);
                }
            }
        });
    }

    fn update(&mut self, props: &Props) {
        self.inner.props.replace(props);
    }

    fn unmount(&mut self) {
        self.inner.unmount();
    }
}

/// Background colour.
#[derive(Default)]
pub struct Background {
    inner: Attached,
}

impl Component for Background {
    fn mount(&mut self, ctx: &MountContext<'_>) {
        self.inner.mount(ctx, |props, value| {
            if let Some(color) = props.get("color") {
                set_path(value, &["world", "background"], color);
            }
        });
    }

    fn update(&mut self, props: &Props) {
        self.inner.props.replace(props);
    }

    fn unmount(&mut self) {
        self.inner.unmount();
    }
}

/// Renderer parameters (tone mapping, shadows, ...), forwarded verbatim.
#[derive(Default)]
pub struct RenderParams {
    inner: Attached,
}

impl Component for RenderParams {
    fn mount(&mut self, ctx: &MountContext<'_>) {
        self.inner.mount(ctx, |props, value| {
            let render = props
                .snapshot()
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect();
            set_path(value, &["world", "render"], Value::Map(render));
        });
    }

    fn update(&mut self, props: &Props) {
        self.inner.props.replace(props);
    }

    fn unmount(&mut self) {
        self.inner.unmount();
    }
}

/// Container with no behaviour of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct Group;

impl Component for Group {
    fn mount(&mut self, _ctx: &MountContext<'_>) {}

    fn update(&mut self, _props: &Props) {}

    fn unmount(&mut self) {}
}
