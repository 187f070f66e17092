use std::collections::HashMap;

use super::models::{newest_first, Project, ProjectGroup, Session};

/// Builds the group -> project -> session hierarchy.
///
/// Projects and groups keep the order in which they were first seen, so every
/// stable sort below breaks ties the same way on every run.
#[derive(Debug, Clone, Default)]
pub struct ProjectGrouper {
    projects: Vec<Project>,
    groups: Vec<ProjectGroup>,
}

impl ProjectGrouper {
    pub fn new(sessions: &[Session]) -> Self {
        let mut project_index: HashMap<(&str, &str, &str), usize> = HashMap::new();
        let mut buckets: Vec<Vec<Session>> = Vec::new();
        let mut projects: Vec<Project> = Vec::new();

        for session in sessions {
            let key = (
                session.project_path.as_str(),
                session.project_name.as_str(),
                session.project_group.as_str(),
            );
            let idx = *project_index.entry(key).or_insert_with(|| {
                projects.push(Project {
                    name: session.project_name.clone(),
                    path: session.project_path.clone(),
                    group: session.project_group.clone(),
                    sessions: Vec::new(),
                });
                buckets.push(Vec::new());
                projects.len() - 1
            });
            buckets[idx].push(session.clone());
        }

        for (project, mut sessions) in projects.iter_mut().zip(buckets) {
            sessions.sort_by(newest_first);
            project.sessions = sessions;
        }

        let mut group_index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<ProjectGroup> = Vec::new();
        for project in &projects {
            let idx = *group_index.entry(project.group.as_str()).or_insert_with(|| {
                groups.push(ProjectGroup {
                    name: project.group.clone(),
                    projects: Vec::new(),
                });
                groups.len() - 1
            });
            groups[idx].projects.push(project.clone());
        }
        for group in &mut groups {
            sort_by_session_count(&mut group.projects);
        }

        Self { projects, groups }
    }

    /// All groups, busiest first
    pub fn get_all_groups(&self) -> Vec<ProjectGroup> {
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| b.session_count().cmp(&a.session_count()));
        groups
    }

    pub fn get_group(&self, name: &str) -> Option<&ProjectGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Group names in alphabetical order
    pub fn get_group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|g| g.name.clone()).collect();
        names.sort();
        names
    }

    /// All projects, busiest first
    pub fn get_all_projects(&self) -> Vec<Project> {
        let mut projects = self.projects.clone();
        sort_by_session_count(&mut projects);
        projects
    }

    pub fn get_project(&self, path: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.path == path)
    }

    pub fn get_project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Projects of one group, busiest first. Unknown groups give an empty list.
    pub fn get_projects_in_group(&self, group_name: &str) -> Vec<Project> {
        self.get_group(group_name)
            .map(|g| g.projects.clone())
            .unwrap_or_default()
    }
}

fn sort_by_session_count(projects: &mut [Project]) {
    projects.sort_by(|a, b| b.session_count().cmp(&a.session_count()));
}
