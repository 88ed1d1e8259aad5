//! Rental stage service

use validator::Validate;

use crate::{
    error::AppResult,
    models::stage::{check_stage_book_state, CreateStage, RentalStage, UpdateStage},
    repository::Repository,
};

#[derive(Clone)]
pub struct StagesService {
    repository: Repository,
}

impl StagesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Stages in display order
    pub async fn list(&self) -> AppResult<Vec<RentalStage>> {
        self.repository.stages.list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<RentalStage> {
        self.repository.stages.get_by_id(id).await
    }

    pub async fn create(&self, stage: CreateStage) -> AppResult<RentalStage> {
        stage.validate()?;
        if let Some(state) = stage.book_state {
            check_stage_book_state(state)?;
        }
        let created = self.repository.stages.create(&stage).await?;
        tracing::info!("Stage {} created: {}", created.id, created.name);
        Ok(created)
    }

    pub async fn update(&self, id: i32, stage: UpdateStage) -> AppResult<RentalStage> {
        stage.validate()?;
        if let Some(state) = stage.book_state {
            check_stage_book_state(state)?;
        }
        self.repository.stages.update(id, &stage).await
    }

    /// Delete a stage; rentals in it lose their stage
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.stages.delete(id).await?;
        tracing::info!("Stage {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::book::BookState};

    fn stage(name: &str, sequence: i32) -> CreateStage {
        CreateStage {
            name: name.to_string(),
            sequence,
            fold: false,
            book_state: None,
        }
    }

    #[tokio::test]
    async fn test_list_in_display_order() {
        let stages = StagesService::new(Repository::in_memory());
        stages.create(stage("Overdue", 2)).await.unwrap();
        stages.create(stage("Returned", 2)).await.unwrap();
        stages.create(stage("Out", 1)).await.unwrap();

        let names: Vec<String> = stages.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Out", "Overdue", "Returned"]);
    }

    #[tokio::test]
    async fn test_create_defaults_and_checks() {
        let stages = StagesService::new(Repository::in_memory());
        let created = stages.create(stage("Out", 1)).await.unwrap();
        assert_eq!(created.book_state, BookState::Available);

        let mut draft = stage("Cataloguing", 0);
        draft.book_state = Some(BookState::Draft);
        assert!(matches!(stages.create(draft).await, Err(AppError::Validation(_))));
        assert!(matches!(stages.create(stage("", 0)).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let stages = StagesService::new(Repository::in_memory());
        let created = stages.create(stage("Out", 1)).await.unwrap();

        let updated = stages
            .update(
                created.id,
                UpdateStage {
                    fold: Some(true),
                    book_state: Some(BookState::Lost),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.fold);
        assert_eq!(updated.book_state, BookState::Lost);
        assert_eq!(updated.name, "Out");

        stages.delete(created.id).await.unwrap();
        assert!(matches!(stages.get(created.id).await, Err(AppError::NotFound(_))));
    }
}
