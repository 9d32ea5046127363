use crate::component::BuildResults;
use crate::error::RenderError;

/// Consumes the output of a build pass: a live DOM reconciler, an HTML
/// serializer, or anything else that wants the tree.
pub trait Renderer {
    fn render(&mut self, results: &BuildResults) -> Result<(), RenderError>;

    /// Operations issued against the output by the last `render`.
    fn last_patch_count(&self) -> usize {
        0
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, results: &BuildResults) -> Result<(), RenderError> {
        (**self).render(results)
    }

    fn last_patch_count(&self) -> usize {
        (**self).last_patch_count()
    }
}
