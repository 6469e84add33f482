use std::sync::Arc;

use crate::actions::widgets::{GenericHttpWidget, Widget, WidgetBackend};

pub fn movie_widget(backend: Arc<dyn WidgetBackend>) -> impl Widget {
    GenericHttpWidget::new("movie", |c| c.widgets.show_movie_widget, backend)
}
