use crate::flow::step::{
    ChangeAction, ClickAction, CloseAction, CustomStepAction, DoubleClickAction, HoverAction,
    InvalidAction, KeyDownAction, KeyUpAction, NavigateAction, ScrollAction, SetViewportAction,
    UnsupportedAction, WaitForElementAction, WaitForExpressionAction,
};
use crate::flow::{Action, Step};
use crate::page::{ElementRef, PageDriver};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Everything a step action needs while it runs.
pub struct StepContext<'a> {
    pub page: &'a dyn PageDriver,
    pub step: &'a Step,
    /// Zero-based position of the step in its flow.
    pub index: usize,
    /// Element picked by the selector resolver, if the step had selectors.
    pub element: Option<&'a ElementRef>,
    pub timeout: Duration,
}

impl StepContext<'_> {
    /// The resolved element, or the step's fatal "no valid selector" error.
    pub fn element(&self) -> Result<&ElementRef> {
        self.element
            .ok_or_else(|| selector_not_found(self.index, self.step))
    }
}

pub(crate) fn invalid_step(index: usize, invalid: &InvalidAction) -> Error {
    Error::ActionFailed(format!("step<{}>: {}", index, invalid.error))
}

pub(crate) fn selector_not_found(index: usize, step: &Step) -> Error {
    Error::SelectorNotFound {
        step: index,
        step_json: step.raw.to_string(),
    }
}

/// Behavior of one step kind. Each [`Action`] payload implements it.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Whether the step cannot run without a resolved element.
    fn requires_element(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()>;
}

impl Action {
    /// The behavior attached to this step kind.
    pub fn as_step_action(&self) -> &dyn StepAction {
        match self {
            Self::Navigate(a) => a,
            Self::Close(a) => a,
            Self::SetViewport(a) => a,
            Self::Click(a) => a,
            Self::DoubleClick(a) => a,
            Self::Hover(a) => a,
            Self::Scroll(a) => a,
            Self::Change(a) => a,
            Self::KeyDown(a) => a,
            Self::KeyUp(a) => a,
            Self::WaitForElement(a) => a,
            Self::WaitForExpression(a) => a,
            Self::CustomStep(a) => a,
            Self::Unsupported(a) => a,
            Self::Invalid(a) => a,
        }
    }
}

/// Run a step's action against the page.
pub async fn execute(
    page: &dyn PageDriver,
    step: &Step,
    index: usize,
    element: Option<&ElementRef>,
) -> Result<()> {
    let ctx = StepContext {
        page,
        step,
        index,
        element,
        timeout: Duration::from_millis(step.timeout_ms),
    };
    let action = step.action.as_step_action();
    if action.requires_element() && element.is_none() {
        return Err(selector_not_found(index, step));
    }
    action.execute(&ctx).await
}

#[async_trait]
impl StepAction for NavigateAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("navigate: {}", self.url);
        ctx.page.goto(&self.url, ctx.timeout).await
    }
}

#[async_trait]
impl StepAction for CloseAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("close");
        ctx.page.close().await
    }
}

#[async_trait]
impl StepAction for SetViewportAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("set_viewport: {}x{}", self.width, self.height);
        // Device emulation is recorded but not applied; only the size changes.
        debug!(
            "set_viewport: ignoring deviceScaleFactor={:?} isMobile={:?} hasTouch={:?} isLandscape={:?}",
            self.device_scale_factor, self.is_mobile, self.has_touch, self.is_landscape
        );
        ctx.page.set_viewport(self.width, self.height).await
    }
}

#[async_trait]
impl StepAction for ClickAction {
    fn requires_element(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let element = ctx.element()?;
        info!(
            "click: {} at ({}, {})",
            element.selector, self.offset_x, self.offset_y
        );
        ctx.page
            .click(element, self.offset_x, self.offset_y, 1, ctx.timeout)
            .await
    }
}

#[async_trait]
impl StepAction for DoubleClickAction {
    fn requires_element(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let element = ctx.element()?;
        info!(
            "double_click: {} at ({}, {})",
            element.selector, self.offset_x, self.offset_y
        );
        ctx.page
            .click(element, self.offset_x, self.offset_y, 2, ctx.timeout)
            .await
    }
}

#[async_trait]
impl StepAction for HoverAction {
    fn requires_element(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let element = ctx.element()?;
        info!("hover: {}", element.selector);
        ctx.page.hover(element, ctx.timeout).await
    }
}

#[async_trait]
impl StepAction for ScrollAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("scroll: to ({}, {})", self.x, self.y);
        ctx.page
            .evaluate(&format!("window.scrollTo({}, {})", self.x, self.y))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StepAction for ChangeAction {
    fn requires_element(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let element = ctx.element()?;
        info!("change: {} = '{}'", element.selector, self.value);
        ctx.page.fill(element, &self.value, ctx.timeout).await
    }
}

#[async_trait]
impl StepAction for KeyDownAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("key_down: {}", self.key);
        ctx.page.key_down(&self.key).await
    }
}

#[async_trait]
impl StepAction for KeyUpAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!("key_up: {}", self.key);
        ctx.page.key_up(&self.key).await
    }
}

#[async_trait]
impl StepAction for WaitForElementAction {
    fn requires_element(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        let selector = &ctx.element()?.selector;
        info!(
            "wait_for_element: {} {} {} (visible: {})",
            selector, self.operator, self.count, self.visible
        );
        ctx.page
            .wait_for_selector(selector, self.visible, ctx.timeout)
            .await?;
        ctx.page
            .wait_for_count(selector, self.operator, self.count, ctx.timeout)
            .await?;
        if !self.properties.is_empty() {
            debug!("wait_for_element: properties {:?}", self.properties);
            ctx.page
                .wait_for_properties(selector, &self.properties, ctx.timeout)
                .await?;
        }
        if !self.attributes.is_empty() {
            debug!("wait_for_element: attributes {:?}", self.attributes);
            ctx.page
                .wait_for_attributes(selector, &self.attributes, ctx.timeout)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StepAction for WaitForExpressionAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        info!(
            "wait_for_expression: {} ({}ms)",
            self.expression,
            ctx.timeout.as_millis()
        );
        ctx.page
            .wait_for_expression(&self.expression, ctx.timeout)
            .await
    }
}

#[async_trait]
impl StepAction for CustomStepAction {
    async fn execute(&self, _ctx: &StepContext<'_>) -> Result<()> {
        info!(
            "custom_step: {} with parameters {}",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.parameters
        );
        Ok(())
    }
}

#[async_trait]
impl StepAction for UnsupportedAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        error!("step<{}>: unsupported action type: {}", ctx.index, self.kind);
        Ok(())
    }
}

#[async_trait]
impl StepAction for InvalidAction {
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        Err(invalid_step(ctx.index, self))
    }
}
