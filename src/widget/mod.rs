//! Widget host plumbing: target sizing and the refresh, toggle and delete flows.

use image::RgbaImage;

use crate::compositor::{Compositor, OverlayLayout, RenderTarget};
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::note::{Mode, WidgetId};
use crate::source::{load_source_image, ImageSource};
use crate::storage::{delete_note_state, load_note_state, save_mode, NoteRepository};

/// Size hints a host reports for one widget, in dp. Non-positive means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostSizeOptions {
    pub min_width_dp: f64,
    pub min_height_dp: f64,
}

impl HostSizeOptions {
    pub const fn new(min_width_dp: f64, min_height_dp: f64) -> Self {
        Self {
            min_width_dp,
            min_height_dp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickTarget {
    ToggleMode,
    OpenConfiguration,
}

/// Everything handed to the host for one widget instance.
#[derive(Debug, Clone)]
pub struct WidgetUpdate {
    pub image: RgbaImage,
    pub mode: Mode,
    pub overlay: OverlayLayout,
    pub click_targets: Vec<ClickTarget>,
}

/// The surface that displays widget bitmaps.
pub trait WidgetHost {
    fn size_options(&self, id: WidgetId) -> HostSizeOptions;
    fn present(&mut self, id: WidgetId, update: WidgetUpdate);
    /// Every instance currently placed.
    fn widget_ids(&self) -> Vec<WidgetId>;
}

/// Converts host size hints to pixels, defaulting unknown axes and capping both.
pub fn resolve_target_size(options: HostSizeOptions, config: &AppConfig) -> RenderTarget {
    let axis = |dp: f64| {
        let dp = if dp.is_finite() && dp > 0.0 {
            dp
        } else {
            config.default_widget_size_dp
        };
        let px = config.dp(dp.min(config.max_widget_size_dp)).round();
        px.max(1.0) as u32
    };
    RenderTarget::new(axis(options.min_width_dp), axis(options.min_height_dp))
}

pub struct WidgetService {
    config: AppConfig,
    compositor: Compositor,
    repository: Box<dyn NoteRepository>,
    images: Box<dyn ImageSource>,
}

impl std::fmt::Debug for WidgetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetService")
            .field("config", &self.config)
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}

impl WidgetService {
    pub fn new(
        config: AppConfig,
        compositor: Compositor,
        repository: Box<dyn NoteRepository>,
        images: Box<dyn ImageSource>,
    ) -> Self {
        Self {
            config,
            compositor,
            repository,
            images,
        }
    }

    pub fn repository(&self) -> &dyn NoteRepository {
        self.repository.as_ref()
    }

    pub fn repository_mut(&mut self) -> &mut dyn NoteRepository {
        self.repository.as_mut()
    }

    pub fn on_placed(&mut self, host: &mut dyn WidgetHost, id: WidgetId) -> AppResult<()> {
        let options = host.size_options(id);
        self.refresh(host, id, options)
    }

    pub fn on_options_changed(
        &mut self,
        host: &mut dyn WidgetHost,
        id: WidgetId,
        options: HostSizeOptions,
    ) -> AppResult<()> {
        self.refresh(host, id, options)
    }

    /// Flips the stored mode and re-renders.
    pub fn on_toggle(&mut self, host: &mut dyn WidgetHost, id: WidgetId) -> AppResult<Mode> {
        let mut state = load_note_state(self.repository.as_ref(), id);
        let mode = state.toggle_mode();
        save_mode(self.repository.as_mut(), id, mode)?;
        tracing::debug!(%id, mode = mode.as_str(), "toggled widget mode");
        let options = host.size_options(id);
        self.refresh(host, id, options)?;
        Ok(mode)
    }

    /// Re-renders every placed instance. A failing instance is logged and
    /// skipped so the rest still update.
    pub fn refresh_all(&mut self, host: &mut dyn WidgetHost) {
        for id in host.widget_ids() {
            let options = host.size_options(id);
            if let Err(err) = self.refresh(host, id, options) {
                tracing::warn!(%id, ?err, "widget refresh failed");
            }
        }
    }

    pub fn on_deleted(&mut self, ids: &[WidgetId]) -> AppResult<()> {
        for id in ids {
            delete_note_state(self.repository.as_mut(), *id)?;
            tracing::debug!(%id, "deleted widget state");
        }
        Ok(())
    }

    /// Renders one instance from its stored state and hands the result to the host.
    pub fn refresh(
        &mut self,
        host: &mut dyn WidgetHost,
        id: WidgetId,
        options: HostSizeOptions,
    ) -> AppResult<()> {
        let state = load_note_state(self.repository.as_ref(), id);
        let target = resolve_target_size(options, &self.config);

        let photo = match (state.effective_mode(), state.photo_uri.as_deref()) {
            (Mode::Photo, Some(uri)) => {
                match load_source_image(
                    self.images.as_ref(),
                    uri,
                    Some((target.width, target.height)),
                ) {
                    Ok(photo) => Some(photo.image),
                    Err(err) => {
                        tracing::warn!(%id, ?err, "photo unavailable; falling back to note");
                        None
                    }
                }
            }
            _ => None,
        };

        let rendered = self.compositor.render(&state, photo.as_ref(), target)?;
        drop(photo);

        let mut click_targets = vec![ClickTarget::OpenConfiguration];
        if rendered.layout.overlay.toggle_visible {
            click_targets.insert(0, ClickTarget::ToggleMode);
        }
        tracing::debug!(
            %id,
            width = target.width,
            height = target.height,
            mode = rendered.layout.mode.as_str(),
            "widget refreshed"
        );
        host.present(
            id,
            WidgetUpdate {
                image: rendered.image,
                mode: rendered.layout.mode,
                overlay: rendered.layout.overlay,
                click_targets,
            },
        );
        Ok(())
    }
}
